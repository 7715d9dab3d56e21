//! Search monitors decide, at every node, whether a search may continue.
//!
//! The backtracking engine asks its monitor for a [`SearchCommand`] once per
//! node, which makes every node a safe checkpoint for time limits, node limits
//! and caller cancellation.

use crate::solver::{CancelToken, SearchBudget};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCommand {
    Continue,
    Terminate(String),
}

pub trait SearchMonitor: Send {
    fn name(&self) -> &str;

    fn on_enter_search(&mut self) {}

    fn on_step(&mut self) {}

    fn on_solution_found(&mut self, _objective: u32) {}

    fn search_command(&self) -> SearchCommand;
}

/// Enforces a wall-clock budget. The clock is read only every
/// `clock_check_mask + 1` steps.
#[derive(Debug, Clone)]
pub struct TimeLimitMonitor {
    clock_check_mask: u64,
    steps: u64,
    time_limit: Duration,
    start_time: Instant,
}

impl TimeLimitMonitor {
    /// Check every 1024 steps.
    const DEFAULT_STEP_CLOCK_CHECK_MASK: u64 = 0x3FF;

    pub fn new(time_limit: Duration) -> Self {
        Self::with_clock_check_mask(time_limit, Self::DEFAULT_STEP_CLOCK_CHECK_MASK)
    }

    pub fn with_clock_check_mask(time_limit: Duration, clock_check_mask: u64) -> Self {
        Self {
            clock_check_mask,
            steps: 0,
            time_limit,
            start_time: Instant::now(),
        }
    }
}

impl SearchMonitor for TimeLimitMonitor {
    fn name(&self) -> &str {
        "TimeLimitMonitor"
    }

    fn on_enter_search(&mut self) {
        self.start_time = Instant::now();
        self.steps = 0;
    }

    #[inline(always)]
    fn on_step(&mut self) {
        self.steps = self.steps.wrapping_add(1);
    }

    fn search_command(&self) -> SearchCommand {
        if (self.steps & self.clock_check_mask) == 0 && self.start_time.elapsed() >= self.time_limit
        {
            return SearchCommand::Terminate("time limit reached".to_string());
        }
        SearchCommand::Continue
    }
}

#[derive(Debug, Clone)]
pub struct NodeLimitMonitor {
    limit: u64,
    steps: u64,
}

impl NodeLimitMonitor {
    pub fn new(limit: u64) -> Self {
        Self { limit, steps: 0 }
    }
}

impl SearchMonitor for NodeLimitMonitor {
    fn name(&self) -> &str {
        "NodeLimitMonitor"
    }

    fn on_enter_search(&mut self) {
        self.steps = 0;
    }

    fn on_step(&mut self) {
        self.steps += 1;
    }

    fn search_command(&self) -> SearchCommand {
        if self.steps > self.limit {
            SearchCommand::Terminate("node limit reached".to_string())
        } else {
            SearchCommand::Continue
        }
    }
}

/// Stops the search once the caller cancels the token.
#[derive(Debug, Clone)]
pub struct InterruptMonitor {
    token: CancelToken,
}

impl InterruptMonitor {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }
}

impl SearchMonitor for InterruptMonitor {
    fn name(&self) -> &str {
        "InterruptMonitor"
    }

    fn search_command(&self) -> SearchCommand {
        if self.token.is_cancelled() {
            SearchCommand::Terminate("Interrupt signal received".to_string())
        } else {
            SearchCommand::Continue
        }
    }
}

/// Fans every event out to its children; the first child asking to stop wins.
#[derive(Default)]
pub struct CompositeMonitor {
    monitors: Vec<Box<dyn SearchMonitor>>,
}

impl CompositeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitors for every limit set in `budget`.
    pub fn for_budget(budget: &SearchBudget) -> Self {
        let mut composite = Self::new();
        composite.add(InterruptMonitor::new(budget.cancel.clone()));
        if let Some(limit) = budget.time_limit {
            composite.add(TimeLimitMonitor::new(limit));
        }
        if let Some(limit) = budget.node_limit {
            composite.add(NodeLimitMonitor::new(limit));
        }
        composite
    }

    pub fn add<M>(&mut self, monitor: M)
    where
        M: SearchMonitor + 'static,
    {
        self.monitors.push(Box::new(monitor));
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl SearchMonitor for CompositeMonitor {
    fn name(&self) -> &str {
        "CompositeMonitor"
    }

    fn on_enter_search(&mut self) {
        self.monitors.iter_mut().for_each(|m| m.on_enter_search());
    }

    fn on_step(&mut self) {
        self.monitors.iter_mut().for_each(|m| m.on_step());
    }

    fn on_solution_found(&mut self, objective: u32) {
        self.monitors
            .iter_mut()
            .for_each(|m| m.on_solution_found(objective));
    }

    fn search_command(&self) -> SearchCommand {
        self.monitors
            .iter()
            .map(|m| m.search_command())
            .find(|command| matches!(command, SearchCommand::Terminate(_)))
            .unwrap_or(SearchCommand::Continue)
    }
}
