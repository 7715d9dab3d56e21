//! Search engines for a [`TimetableModel`].
//!
//! Every engine implements [`Solver`]. Whatever the algorithm, an outcome that
//! carries an assignment has been checked against the model's hard constraints
//! before it leaves the solver.

pub mod backtracking;
pub mod milp;
pub mod monitor;

pub use backtracking::BacktrackingSolver;
pub use milp::MilpSolver;

use crate::config::{SolverBackend, SolverSettings};
use crate::model::{Assignment, TimetableModel};
use log::warn;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared flag a caller flips to abort a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits on a single search run.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    pub time_limit: Option<Duration>,
    pub node_limit: Option<u64>,
    pub cancel: CancelToken,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_node_limit(mut self, limit: u64) -> Self {
        self.node_limit = Some(limit);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Objective proven minimal.
    Optimal,
    /// Valid assignment, optimality not proven.
    Feasible,
    /// No valid assignment exists, or none was found within the budget.
    Infeasible,
    /// Aborted by the caller before any valid assignment was found.
    Cancelled,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Feasible => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    OptimalityProven,
    InfeasibilityProven,
    /// A search limit or the caller stopped the run.
    Aborted(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::OptimalityProven => write!(f, "Optimality Proven"),
            TerminationReason::InfeasibilityProven => write!(f, "Infeasibility Proven"),
            TerminationReason::Aborted(reason) => write!(f, "Aborted: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStatistics {
    pub nodes: u64,
    pub backtracks: u64,
    pub solutions_found: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub assignment: Option<Assignment>,
    pub objective: Option<u32>,
    pub reason: TerminationReason,
    pub statistics: SolverStatistics,
}

impl SolveOutcome {
    /// Outcome without an assignment. `Cancelled` is reported only when the
    /// caller asked for it and the search was cut short.
    pub fn without_solution(
        reason: TerminationReason,
        cancel: &CancelToken,
        statistics: SolverStatistics,
    ) -> Self {
        let status = match reason {
            TerminationReason::Aborted(_) if cancel.is_cancelled() => SolveStatus::Cancelled,
            _ => SolveStatus::Infeasible,
        };
        Self {
            status,
            assignment: None,
            objective: None,
            reason,
            statistics,
        }
    }

    /// Outcome for a candidate assignment. The candidate is re-checked against
    /// every hard constraint; a broken one turns the outcome infeasible.
    pub fn with_solution(
        model: &TimetableModel,
        assignment: Assignment,
        proven_optimal: bool,
        reason: TerminationReason,
        statistics: SolverStatistics,
    ) -> Self {
        let violations = model.violations(&assignment);
        if !violations.is_empty() {
            warn!(
                "Discarding candidate timetable: {} hard constraint(s) broken, first is {}.",
                violations.len(),
                violations[0].kind
            );
            return Self {
                status: SolveStatus::Infeasible,
                assignment: None,
                objective: None,
                reason,
                statistics,
            };
        }
        Self {
            status: if proven_optimal {
                SolveStatus::Optimal
            } else {
                SolveStatus::Feasible
            },
            objective: Some(model.objective(&assignment)),
            assignment: Some(assignment),
            reason,
            statistics,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self.status, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, model: &TimetableModel, budget: &SearchBudget) -> SolveOutcome;
}

/// Builds the solver selected by the settings.
pub fn from_settings(settings: &SolverSettings) -> Box<dyn Solver> {
    match settings.backend {
        SolverBackend::Milp => Box::new(MilpSolver::new(
            settings.threads,
            settings.random_seed,
            settings.verbose,
        )),
        SolverBackend::Backtracking => Box::new(BacktrackingSolver::new()),
    }
}
