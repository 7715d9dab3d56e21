//! Depth-first branch-and-bound over (slot, class) positions.
//!
//! Positions are visited slot-major: every class decides what it studies in
//! slot 0, then every class decides slot 1, and so on. A decision is either one
//! of the class's lessons or a free period. Because a whole slot is settled
//! before the next one starts, teacher clashes and run windows can be checked
//! against already fixed slots only.
//!
//! Pruning:
//! - a lesson must still fit into the remaining slots under the run-window rule
//! - a class must have enough slots left for all its outstanding periods
//! - a teacher must have enough slots left for all outstanding lessons
//! - partial cost is monotone, so any branch no cheaper than the incumbent is cut
//!
//! The search stops early at cost zero, which is optimal by construction.

use crate::model::{Assignment, RUN_WINDOW, TimetableModel, run_capacity};
use crate::solver::monitor::{CompositeMonitor, SearchCommand, SearchMonitor};
use crate::solver::{
    CancelToken, SearchBudget, SolveOutcome, Solver, SolverStatistics, TerminationReason,
};
use log::{debug, info};
use std::cmp::Reverse;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct BacktrackingSolver;

impl BacktrackingSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Solver for BacktrackingSolver {
    fn name(&self) -> &str {
        "backtracking"
    }

    fn solve(&self, model: &TimetableModel, budget: &SearchBudget) -> SolveOutcome {
        let monitor = CompositeMonitor::for_budget(budget);
        Search::new(model, monitor).run(&budget.cancel)
    }
}

#[derive(Debug, Clone, Copy)]
struct Choice {
    lesson: Option<usize>,
    delta: u32,
}

#[derive(Debug, Clone, Copy)]
struct Applied {
    choice: Choice,
    prev_busy: usize,
}

#[derive(Debug)]
struct Frame {
    choices: Vec<Choice>,
    next: usize,
    applied: Option<Applied>,
}

impl Frame {
    fn new(choices: Vec<Choice>) -> Self {
        Self {
            choices,
            next: 0,
            applied: None,
        }
    }
}

const NOT_BUSY: usize = usize::MAX;

struct Search<'a> {
    model: &'a TimetableModel,
    monitor: CompositeMonitor,
    slots: usize,
    num_classes: usize,
    periods_per_day: usize,
    window_limit: usize,
    pair_weight: u32,
    repeat_weight: u32,
    track_daily: bool,
    /// Lesson taught per `class * slots + slot`.
    grid: Vec<Option<usize>>,
    remaining: Vec<u32>,
    class_remaining: Vec<u32>,
    teacher_remaining: Vec<u32>,
    /// Last slot each teacher was booked for.
    teacher_busy: Vec<usize>,
    /// Occurrences per `lesson * periods_per_day + period`.
    daily: Vec<u32>,
    cost: u32,
    best: Option<(u32, Vec<Option<usize>>)>,
    stats: SolverStatistics,
    start_time: Instant,
}

impl<'a> Search<'a> {
    fn new(model: &'a TimetableModel, monitor: CompositeMonitor) -> Self {
        let week = model.week();
        let slots = week.slots();
        let options = model.options();
        let lessons = model.lessons();

        // with fewer than three slots there are no run windows at all
        let window_limit = if slots < RUN_WINDOW {
            RUN_WINDOW
        } else {
            (options.run_window_limit as usize).min(RUN_WINDOW)
        };

        let remaining: Vec<u32> = lessons.iter().map(|l| l.required).collect();
        let class_remaining = model
            .classes()
            .iter()
            .map(|c| c.lessons.iter().map(|&l| remaining[l]).sum())
            .collect();
        let teacher_remaining = model
            .teachers()
            .iter()
            .map(|t| t.lessons.iter().map(|&l| remaining[l]).sum())
            .collect();

        Self {
            model,
            monitor,
            slots,
            num_classes: model.classes().len(),
            periods_per_day: week.periods_per_day as usize,
            window_limit,
            pair_weight: options.consecutive_weight,
            repeat_weight: options.daily_repeat_weight,
            track_daily: week.days > 1,
            grid: vec![None; model.classes().len() * slots],
            remaining,
            class_remaining,
            teacher_remaining,
            teacher_busy: vec![NOT_BUSY; model.teachers().len()],
            daily: vec![0; lessons.len() * week.periods_per_day as usize],
            cost: 0,
            best: None,
            stats: SolverStatistics::default(),
            start_time: Instant::now(),
        }
    }

    fn run(mut self, cancel: &CancelToken) -> SolveOutcome {
        info!(
            "Starting backtracking search over {} positions...",
            self.slots * self.num_classes
        );
        self.start_time = Instant::now();
        self.monitor.on_enter_search();

        if !self.root_viable() {
            debug!("Capacity bounds rule out every timetable before branching.");
            return self.finish(TerminationReason::InfeasibilityProven, cancel);
        }

        let total = self.slots * self.num_classes;
        let mut stack = vec![Frame::new(self.choices(0))];

        let reason = loop {
            self.monitor.on_step();
            self.stats.nodes += 1;
            if let SearchCommand::Terminate(msg) = self.monitor.search_command() {
                break TerminationReason::Aborted(msg);
            }

            let Some(position) = stack.len().checked_sub(1) else {
                break self.exhausted();
            };
            let frame = &mut stack[position];

            if let Some(applied) = frame.applied.take() {
                self.undo(position, applied);
            }

            if frame.next == frame.choices.len() {
                stack.pop();
                self.stats.backtracks += 1;
                if stack.is_empty() {
                    break self.exhausted();
                }
                continue;
            }

            let choice = frame.choices[frame.next];
            frame.next += 1;
            if self.cost + choice.delta >= self.bound() {
                continue;
            }
            let Some(applied) = self.apply(position, choice) else {
                continue;
            };
            frame.applied = Some(applied);

            if position + 1 == total {
                self.record_solution();
                if self.bound() == 0 {
                    break TerminationReason::OptimalityProven;
                }
                continue;
            }

            let next = Frame::new(self.choices(position + 1));
            stack.push(next);
        };

        self.finish(reason, cancel)
    }

    fn exhausted(&self) -> TerminationReason {
        if self.best.is_some() {
            TerminationReason::OptimalityProven
        } else {
            TerminationReason::InfeasibilityProven
        }
    }

    fn bound(&self) -> u32 {
        self.best.as_ref().map_or(u32::MAX, |(cost, _)| *cost)
    }

    #[inline]
    fn cell(&self, class: usize, slot: usize) -> Option<usize> {
        self.grid[class * self.slots + slot]
    }

    fn locate(&self, position: usize) -> (usize, usize) {
        (position / self.num_classes, position % self.num_classes)
    }

    fn root_viable(&self) -> bool {
        let capacity = run_capacity(self.slots, self.window_limit as u32);
        self.remaining.iter().all(|&r| r as usize <= capacity)
            && self.class_remaining.iter().all(|&r| r as usize <= self.slots)
            && self.teachers_viable(0)
    }

    fn teachers_viable(&self, slot: usize) -> bool {
        let left = self.slots - slot;
        self.teacher_remaining.iter().all(|&r| r as usize <= left)
    }

    fn window_allows(&self, class: usize, slot: usize, lesson: usize) -> bool {
        if self.window_limit >= RUN_WINDOW {
            return true;
        }
        let from = slot.saturating_sub(RUN_WINDOW - 1);
        let seen = (from..slot)
            .filter(|&s| self.cell(class, s) == Some(lesson))
            .count();
        seen < self.window_limit
    }

    fn delta(&self, class: usize, slot: usize, lesson: usize) -> u32 {
        let mut delta = 0;
        if slot > 0 && self.cell(class, slot - 1) == Some(lesson) {
            delta += self.pair_weight;
        }
        if self.track_daily {
            let period = slot % self.periods_per_day;
            if self.daily[lesson * self.periods_per_day + period] == 1 {
                delta += self.repeat_weight;
            }
        }
        delta
    }

    /// Candidate decisions for `position`, cheapest and most urgent first.
    fn choices(&self, position: usize) -> Vec<Choice> {
        let (slot, class) = self.locate(position);
        if class == 0 && !self.teachers_viable(slot) {
            return Vec::new();
        }

        let bound = self.bound();
        let lessons = self.model.lessons();
        let mut choices: Vec<Choice> = self.model.classes()[class]
            .lessons
            .iter()
            .copied()
            .filter(|&l| self.remaining[l] > 0)
            .filter(|&l| self.teacher_busy[lessons[l].teacher] != slot)
            .filter(|&l| self.window_allows(class, slot, l))
            .map(|l| Choice {
                lesson: Some(l),
                delta: self.delta(class, slot, l),
            })
            .filter(|c| self.cost + c.delta < bound)
            .collect();

        let slack = (self.slots - slot) as u32 > self.class_remaining[class];
        if slack && self.cost < bound {
            choices.push(Choice {
                lesson: None,
                delta: 0,
            });
        }

        choices.sort_by_key(|c| {
            (
                c.delta,
                c.lesson.is_none(),
                Reverse(c.lesson.map_or(0, |l| self.remaining[l])),
                c.lesson,
            )
        });
        choices
    }

    /// Applies `choice`; returns `None` (with the state restored) when the
    /// capacity bounds show the branch cannot be completed.
    fn apply(&mut self, position: usize, choice: Choice) -> Option<Applied> {
        let (slot, class) = self.locate(position);
        let mut prev_busy = NOT_BUSY;

        if let Some(lesson) = choice.lesson {
            let teacher = self.model.lessons()[lesson].teacher;
            prev_busy = self.teacher_busy[teacher];
            self.grid[class * self.slots + slot] = Some(lesson);
            self.remaining[lesson] -= 1;
            self.class_remaining[class] -= 1;
            self.teacher_remaining[teacher] -= 1;
            self.teacher_busy[teacher] = slot;
            self.daily[lesson * self.periods_per_day + slot % self.periods_per_day] += 1;
            self.cost += choice.delta;
        }

        let applied = Applied { choice, prev_busy };
        if self.consistent_after(class, slot, choice.lesson) {
            Some(applied)
        } else {
            self.undo(position, applied);
            None
        }
    }

    fn undo(&mut self, position: usize, applied: Applied) {
        let Some(lesson) = applied.choice.lesson else {
            return;
        };
        let (slot, class) = self.locate(position);
        let teacher = self.model.lessons()[lesson].teacher;
        self.grid[class * self.slots + slot] = None;
        self.remaining[lesson] += 1;
        self.class_remaining[class] += 1;
        self.teacher_remaining[teacher] += 1;
        self.teacher_busy[teacher] = applied.prev_busy;
        self.daily[lesson * self.periods_per_day + slot % self.periods_per_day] -= 1;
        self.cost -= applied.choice.delta;
    }

    fn consistent_after(&self, class: usize, slot: usize, lesson: Option<usize>) -> bool {
        let future = self.slots - slot - 1;
        if self.class_remaining[class] as usize > future {
            return false;
        }
        let capacity = run_capacity(future, self.window_limit as u32);
        let lessons_fit = self.model.classes()[class]
            .lessons
            .iter()
            .all(|&l| self.remaining[l] as usize <= capacity);
        if !lessons_fit {
            return false;
        }
        match lesson {
            Some(l) => {
                let teacher = self.model.lessons()[l].teacher;
                self.teacher_remaining[teacher] as usize <= future
            }
            None => true,
        }
    }

    fn record_solution(&mut self) {
        if self.cost >= self.bound() {
            return;
        }
        self.stats.solutions_found += 1;
        self.monitor.on_solution_found(self.cost);
        debug!(
            "Found timetable with objective {} after {} nodes.",
            self.cost, self.stats.nodes
        );
        self.best = Some((self.cost, self.grid.clone()));
    }

    fn finish(mut self, reason: TerminationReason, cancel: &CancelToken) -> SolveOutcome {
        self.stats.elapsed = self.start_time.elapsed();
        info!(
            "Backtracking search finished in {:.2?} ({}): {} nodes, {} backtracks, {} solutions.",
            self.stats.elapsed,
            reason,
            self.stats.nodes,
            self.stats.backtracks,
            self.stats.solutions_found
        );

        let Some((_, grid)) = self.best.take() else {
            return SolveOutcome::without_solution(reason, cancel, self.stats);
        };

        let mut assignment = Assignment::empty(self.model.num_vars());
        for class in 0..self.num_classes {
            for slot in 0..self.slots {
                if let Some(lesson) = grid[class * self.slots + slot] {
                    assignment.set(self.model.var(lesson, slot), true);
                }
            }
        }
        let proven = reason == TerminationReason::OptimalityProven;
        SolveOutcome::with_solution(self.model, assignment, proven, reason, self.stats)
    }
}
