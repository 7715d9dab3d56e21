//! Decision variables and constraints of a weekly timetable.
//!
//! A *lesson* is a (class, subject) pair. Every lesson owns one boolean per slot,
//! laid out contiguously, so `x[lesson, slot]` is variable
//! `lesson * slots + slot`. Constraints and penalties are stored as plain
//! records over those variables; solvers translate them into whatever form
//! their search needs and use [`TimetableModel::violations`] as the final word
//! on feasibility.

use crate::data::{Document, Slot, Week};
use crate::error::{Result, TimetableError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Number of consecutive slots covered by a run-window constraint.
pub const RUN_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelOptions {
    /// Most slots a lesson may occupy in any window of three consecutive slots.
    pub run_window_limit: u32,
    pub consecutive_weight: u32,
    pub daily_repeat_weight: u32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            run_window_limit: 1,
            consecutive_weight: 3,
            daily_repeat_weight: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub class: usize,
    pub subject: String,
    pub teacher: usize,
    pub required: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPlan {
    pub name: String,
    pub lessons: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherLoad {
    pub name: String,
    pub lessons: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Completeness,
    SingleSubject,
    RunWindow,
    TeacherExclusive,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Completeness => "completeness",
            ConstraintKind::SingleSubject => "single subject per slot",
            ConstraintKind::RunWindow => "run window",
            ConstraintKind::TeacherExclusive => "teacher exclusivity",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exactly(u32),
    AtMost(u32),
}

impl Bound {
    pub fn admits(&self, count: u32) -> bool {
        match *self {
            Bound::Exactly(n) => count == n,
            Bound::AtMost(n) => count <= n,
        }
    }
}

/// A hard constraint: the number of true variables in `vars` must satisfy `bound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub vars: Vec<VarId>,
    pub bound: Bound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PenaltyKind {
    ConsecutivePair,
    DailyRepeat,
}

/// A soft term that costs `weight` once two or more of its variables are true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    pub kind: PenaltyKind,
    pub vars: Vec<VarId>,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ConstraintKind,
    pub constraint: usize,
    pub count: u32,
}

/// One value per decision variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<bool>,
}

impl Assignment {
    pub fn empty(num_vars: usize) -> Self {
        Self {
            values: vec![false; num_vars],
        }
    }

    pub fn from_values(values: Vec<bool>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn get(&self, var: VarId) -> bool {
        self.values.get(var.0).copied().unwrap_or(false)
    }

    #[inline]
    pub fn set(&mut self, var: VarId, value: bool) {
        self.values[var.0] = value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn count(&self, vars: &[VarId]) -> u32 {
        vars.iter().filter(|v| self.get(**v)).count() as u32
    }
}

#[derive(Debug, Clone)]
pub struct TimetableModel {
    week: Week,
    options: ModelOptions,
    classes: Vec<ClassPlan>,
    lessons: Vec<Lesson>,
    teachers: Vec<TeacherLoad>,
    constraints: Vec<Constraint>,
    penalties: Vec<Penalty>,
}

impl TimetableModel {
    /// Builds the model, failing fast on the first blocking precondition.
    pub fn build(doc: &Document, week: Week, options: &ModelOptions) -> Result<Self> {
        check_preconditions(doc, week, options)?;

        let periods = doc.subject_periods();
        let teacher_of = doc.teacher_map();
        let slots = week.slots();

        let mut classes = Vec::with_capacity(doc.classes.len());
        let mut lessons = Vec::new();
        let mut teachers: Vec<TeacherLoad> = Vec::new();
        let mut teacher_index: HashMap<&str, usize> = HashMap::new();

        for (class_idx, class) in doc.classes.iter().enumerate() {
            let mut plan = ClassPlan {
                name: class.name.clone(),
                lessons: Vec::new(),
            };
            for subject in class.distinct_subjects() {
                // preconditions guarantee both lookups
                let (Some(&required), Some(&teacher_name)) =
                    (periods.get(subject), teacher_of.get(subject))
                else {
                    return Err(TimetableError::Reference(format!(
                        "Subject '{subject}' in class '{}' is not defined in subjects list.",
                        class.name
                    )));
                };
                let teacher = *teacher_index.entry(teacher_name).or_insert_with(|| {
                    teachers.push(TeacherLoad {
                        name: teacher_name.to_string(),
                        lessons: Vec::new(),
                    });
                    teachers.len() - 1
                });
                let lesson = lessons.len();
                lessons.push(Lesson {
                    class: class_idx,
                    subject: subject.to_string(),
                    teacher,
                    required,
                });
                plan.lessons.push(lesson);
                teachers[teacher].lessons.push(lesson);
            }
            classes.push(plan);
        }

        info!(
            "Setting up timetable model with {} classes, {} lessons, {} teachers and {} slots...",
            classes.len(),
            lessons.len(),
            teachers.len(),
            slots
        );

        let mut model = Self {
            week,
            options: *options,
            classes,
            lessons,
            teachers,
            constraints: Vec::new(),
            penalties: Vec::new(),
        };
        model.add_hard_constraints();
        model.add_penalties();

        debug!(
            "Model has {} variables, {} constraints and {} penalty terms.",
            model.num_vars(),
            model.constraints.len(),
            model.penalties.len()
        );
        Ok(model)
    }

    fn add_hard_constraints(&mut self) {
        let slots = self.week.slots();
        let mut constraints = Vec::new();

        for lesson in 0..self.lessons.len() {
            constraints.push(Constraint {
                kind: ConstraintKind::Completeness,
                vars: self.lesson_vars(lesson).collect(),
                bound: Bound::Exactly(self.lessons[lesson].required),
            });
        }

        for class in &self.classes {
            if class.lessons.len() < 2 {
                continue;
            }
            for slot in 0..slots {
                constraints.push(Constraint {
                    kind: ConstraintKind::SingleSubject,
                    vars: class.lessons.iter().map(|&l| self.var(l, slot)).collect(),
                    bound: Bound::AtMost(1),
                });
            }
        }

        if (self.options.run_window_limit as usize) < RUN_WINDOW && slots >= RUN_WINDOW {
            for lesson in 0..self.lessons.len() {
                for start in 0..=(slots - RUN_WINDOW) {
                    constraints.push(Constraint {
                        kind: ConstraintKind::RunWindow,
                        vars: (start..start + RUN_WINDOW)
                            .map(|slot| self.var(lesson, slot))
                            .collect(),
                        bound: Bound::AtMost(self.options.run_window_limit),
                    });
                }
            }
        }

        for teacher in &self.teachers {
            if teacher.lessons.len() < 2 {
                continue;
            }
            for slot in 0..slots {
                constraints.push(Constraint {
                    kind: ConstraintKind::TeacherExclusive,
                    vars: teacher.lessons.iter().map(|&l| self.var(l, slot)).collect(),
                    bound: Bound::AtMost(1),
                });
            }
        }

        self.constraints = constraints;
    }

    fn add_penalties(&mut self) {
        let slots = self.week.slots();
        let mut penalties = Vec::new();

        for lesson in 0..self.lessons.len() {
            if self.options.consecutive_weight > 0 {
                for slot in 0..slots.saturating_sub(1) {
                    penalties.push(Penalty {
                        kind: PenaltyKind::ConsecutivePair,
                        vars: vec![self.var(lesson, slot), self.var(lesson, slot + 1)],
                        weight: self.options.consecutive_weight,
                    });
                }
            }
            if self.options.daily_repeat_weight > 0 && self.week.days > 1 {
                for period in 0..self.week.periods_per_day {
                    penalties.push(Penalty {
                        kind: PenaltyKind::DailyRepeat,
                        vars: (0..self.week.days)
                            .map(|day| self.var(lesson, self.week.slot(day, period)))
                            .collect(),
                        weight: self.options.daily_repeat_weight,
                    });
                }
            }
        }

        self.penalties = penalties;
    }

    pub fn week(&self) -> Week {
        self.week
    }

    pub fn options(&self) -> &ModelOptions {
        &self.options
    }

    pub fn classes(&self) -> &[ClassPlan] {
        &self.classes
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn teachers(&self) -> &[TeacherLoad] {
        &self.teachers
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn penalties(&self) -> &[Penalty] {
        &self.penalties
    }

    pub fn num_vars(&self) -> usize {
        self.lessons.len() * self.week.slots()
    }

    #[inline]
    pub fn var(&self, lesson: usize, slot: Slot) -> VarId {
        VarId(lesson * self.week.slots() + slot)
    }

    pub fn lesson_vars(&self, lesson: usize) -> impl Iterator<Item = VarId> + '_ {
        (0..self.week.slots()).map(move |slot| self.var(lesson, slot))
    }

    /// Slots in which `lesson` is taught under `assignment`.
    pub fn lesson_slots(&self, assignment: &Assignment, lesson: usize) -> Vec<Slot> {
        (0..self.week.slots())
            .filter(|&slot| assignment.get(self.var(lesson, slot)))
            .collect()
    }

    /// Every hard constraint broken by `assignment`.
    pub fn violations(&self, assignment: &Assignment) -> Vec<Violation> {
        if assignment.len() != self.num_vars() {
            return vec![Violation {
                kind: ConstraintKind::Completeness,
                constraint: usize::MAX,
                count: assignment.len() as u32,
            }];
        }
        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(index, constraint)| {
                let count = assignment.count(&constraint.vars);
                (!constraint.bound.admits(count)).then_some(Violation {
                    kind: constraint.kind,
                    constraint: index,
                    count,
                })
            })
            .collect()
    }

    pub fn is_feasible(&self, assignment: &Assignment) -> bool {
        self.violations(assignment).is_empty()
    }

    /// Weighted soft-constraint cost of `assignment`.
    pub fn objective(&self, assignment: &Assignment) -> u32 {
        self.penalties
            .iter()
            .filter(|p| assignment.count(&p.vars) >= 2)
            .map(|p| p.weight)
            .sum()
    }
}

/// Most slots a lesson can still take in `remaining` consecutive slots when any
/// window of three slots holds at most `limit` of them.
pub fn run_capacity(remaining: usize, limit: u32) -> usize {
    let limit = (limit as usize).min(RUN_WINDOW);
    (remaining / RUN_WINDOW) * limit + (remaining % RUN_WINDOW).min(limit)
}

fn check_preconditions(doc: &Document, week: Week, options: &ModelOptions) -> Result<()> {
    week.check().map_err(TimetableError::Schema)?;
    if options.run_window_limit == 0 {
        return Err(TimetableError::Schema(
            "The run window limit must be at least 1.".to_string(),
        ));
    }

    let teachers = doc.teacher_map();
    let mut missing_teachers: Vec<String> = Vec::new();
    for subject in &doc.subjects {
        if !teachers.contains_key(subject.name.as_str()) && !missing_teachers.contains(&subject.name)
        {
            missing_teachers.push(subject.name.clone());
        }
    }
    if !missing_teachers.is_empty() {
        return Err(TimetableError::Staffing(missing_teachers));
    }

    if doc.classes.is_empty() {
        return Err(TimetableError::Schema(
            "No classes defined in the input data.".to_string(),
        ));
    }

    if let Some((_, class)) = doc
        .classes
        .iter()
        .enumerate()
        .find(|(i, c)| doc.classes[..*i].iter().any(|prev| prev.name == c.name))
    {
        return Err(TimetableError::Schema(format!(
            "Class {} is defined more than once.",
            class.name
        )));
    }

    if let Some(class) = doc.classes.iter().find(|c| c.subjects.is_empty()) {
        return Err(TimetableError::Schema(format!(
            "Class {} has no subjects assigned.",
            class.name
        )));
    }

    let slots = week.slots();
    if let Some(subject) = doc.subjects.iter().find(|s| s.periods as usize > slots) {
        return Err(TimetableError::Capacity(format!(
            "Subject '{}' requires {} periods, but only {} slots are available.",
            subject.name, subject.periods, slots
        )));
    }

    let periods = doc.subject_periods();
    for class in &doc.classes {
        if let Some(subject) = class
            .distinct_subjects()
            .into_iter()
            .find(|s| !periods.contains_key(s))
        {
            return Err(TimetableError::Reference(format!(
                "Subject '{subject}' in class '{}' is not defined in subjects list.",
                class.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::document;

    fn two_class_document() -> Document {
        document(
            &[("10A", &["Math", "Art"]), ("10B", &["Math", "History", "Math"])],
            &[("Math", 4), ("Art", 2), ("History", 3)],
            &[("Smith", "Math"), ("Davis", "Art"), ("Davis", "History")],
        )
    }

    #[test]
    fn builds_one_lesson_per_distinct_class_subject() {
        let model =
            TimetableModel::build(&two_class_document(), Week::new(2, 3), &ModelOptions::default())
                .unwrap();

        assert_eq!(model.lessons().len(), 4);
        assert_eq!(model.num_vars(), 4 * 6);
        assert_eq!(model.classes()[1].lessons, vec![2, 3]);
        assert_eq!(model.teachers().len(), 2);
        assert_eq!(model.teachers()[0].lessons, vec![0, 2]);
        assert_eq!(model.teachers()[1].lessons, vec![1, 3]);
        assert_eq!(model.var(2, 5), VarId(17));
    }

    #[test]
    fn constraint_counts_follow_the_shape_of_the_week() {
        let model =
            TimetableModel::build(&two_class_document(), Week::new(2, 3), &ModelOptions::default())
                .unwrap();
        let count = |kind| {
            model
                .constraints()
                .iter()
                .filter(|c| c.kind == kind)
                .count()
        };
        assert_eq!(count(ConstraintKind::Completeness), 4);
        assert_eq!(count(ConstraintKind::SingleSubject), 2 * 6);
        assert_eq!(count(ConstraintKind::RunWindow), 4 * 4);
        assert_eq!(count(ConstraintKind::TeacherExclusive), 2 * 6);

        let pairs = model
            .penalties()
            .iter()
            .filter(|p| p.kind == PenaltyKind::ConsecutivePair)
            .count();
        let repeats = model
            .penalties()
            .iter()
            .filter(|p| p.kind == PenaltyKind::DailyRepeat)
            .count();
        assert_eq!(pairs, 4 * 5);
        assert_eq!(repeats, 4 * 3);
    }

    #[test]
    fn unstaffed_subjects_are_reported_together() {
        let doc = document(
            &[("10A", &["Math"])],
            &[("Math", 4), ("Art", 2), ("History", 3)],
            &[("Smith", "Math")],
        );
        let err = TimetableModel::build(&doc, Week::school_week(8), &ModelOptions::default())
            .unwrap_err();
        match err {
            TimetableError::Staffing(subjects) => assert_eq!(subjects, vec!["Art", "History"]),
            other => panic!("expected staffing error, got {other:?}"),
        }
    }

    #[test]
    fn preconditions_fail_fast_in_order() {
        let week = Week::school_week(8);
        let options = ModelOptions::default();

        let no_classes = document(&[], &[("Math", 4)], &[("Smith", "Math")]);
        assert!(matches!(
            TimetableModel::build(&no_classes, week, &options),
            Err(TimetableError::Schema(_))
        ));

        // over capacity and an unknown subject: capacity is checked first
        let both = document(
            &[("10A", &["Math", "Geography"])],
            &[("Math", 41)],
            &[("Smith", "Math")],
        );
        assert!(matches!(
            TimetableModel::build(&both, week, &options),
            Err(TimetableError::Capacity(_))
        ));

        let unknown = document(
            &[("10A", &["Math", "Geography"])],
            &[("Math", 4)],
            &[("Smith", "Math")],
        );
        match TimetableModel::build(&unknown, week, &options) {
            Err(TimetableError::Reference(message)) => assert!(message.contains("Geography")),
            other => panic!("expected reference error, got {other:?}"),
        }

        let empty_class = document(&[("10A", &[])], &[("Math", 4)], &[("Smith", "Math")]);
        match TimetableModel::build(&empty_class, week, &options) {
            Err(TimetableError::Schema(message)) => {
                assert_eq!(message, "Class 10A has no subjects assigned.")
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn repeated_class_name_is_rejected() {
        let doc = document(
            &[("10A", &["Math"]), ("10A", &["Art"])],
            &[("Math", 3), ("Art", 2)],
            &[("Smith", "Math"), ("Davis", "Art")],
        );
        match TimetableModel::build(&doc, Week::school_week(8), &ModelOptions::default()) {
            Err(TimetableError::Schema(message)) => assert!(message.contains("10A")),
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_week_shapes_are_rejected() {
        let doc = document(&[("10A", &["Math"])], &[("Math", 0)], &[("Smith", "Math")]);
        for week in [Week::new(5, 0), Week::new(7, u32::MAX), Week::new(8, 4)] {
            assert!(
                matches!(
                    TimetableModel::build(&doc, week, &ModelOptions::default()),
                    Err(TimetableError::Schema(_))
                ),
                "{week:?}"
            );
        }
    }

    #[test]
    fn violations_and_objective_of_a_hand_made_assignment() {
        let doc = document(&[("10A", &["Math"])], &[("Math", 3)], &[("Smith", "Math")]);
        let options = ModelOptions {
            run_window_limit: 2,
            ..ModelOptions::default()
        };
        let model = TimetableModel::build(&doc, Week::new(2, 3), &options).unwrap();

        // Math in slots 0, 1 and 3: one adjacent pair, period 0 on both days.
        let mut assignment = Assignment::empty(model.num_vars());
        for slot in [0, 1, 3] {
            assignment.set(model.var(0, slot), true);
        }
        assert!(model.is_feasible(&assignment));
        assert_eq!(model.objective(&assignment), 3 + 1);
        assert_eq!(model.lesson_slots(&assignment, 0), vec![0, 1, 3]);

        // three in a row breaks the run window
        let mut run = Assignment::empty(model.num_vars());
        for slot in [0, 1, 2] {
            run.set(model.var(0, slot), true);
        }
        let violations = model.violations(&run);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ConstraintKind::RunWindow);

        // one period short breaks completeness
        let mut short = Assignment::empty(model.num_vars());
        short.set(model.var(0, 0), true);
        assert_eq!(model.violations(&short)[0].kind, ConstraintKind::Completeness);
    }

    #[test]
    fn run_capacity_matches_densest_pattern() {
        assert_eq!(run_capacity(0, 1), 0);
        assert_eq!(run_capacity(1, 1), 1);
        assert_eq!(run_capacity(4, 1), 2);
        assert_eq!(run_capacity(40, 1), 14);
        assert_eq!(run_capacity(4, 2), 3);
        assert_eq!(run_capacity(40, 2), 27);
        assert_eq!(run_capacity(5, 3), 5);
    }
}
