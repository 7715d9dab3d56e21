use crate::model::{Assignment, Bound, TimetableModel};
use crate::solver::{SearchBudget, SolveOutcome, Solver, SolverStatistics, TerminationReason};
use good_lp::solvers::SolutionStatus;
use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    default_solver,
};
use log::{info, trace, warn};
use std::time::Instant;

/// Solves the timetable as a 0/1 integer program with the HiGHS solver.
///
/// HiGHS cannot be interrupted once it runs, so cancellation is honored before
/// the program is built and again right before the solve call. The time limit
/// is handed to HiGHS itself.
#[derive(Debug, Clone)]
pub struct MilpSolver {
    threads: u32,
    random_seed: u32,
    verbose: bool,
}

impl Default for MilpSolver {
    fn default() -> Self {
        Self::new(1, 1234, false)
    }
}

impl MilpSolver {
    pub fn new(threads: u32, random_seed: u32, verbose: bool) -> Self {
        Self {
            threads: threads.max(1),
            random_seed,
            verbose,
        }
    }
}

impl Solver for MilpSolver {
    fn name(&self) -> &str {
        "milp"
    }

    fn solve(&self, model: &TimetableModel, budget: &SearchBudget) -> SolveOutcome {
        let start_time = Instant::now();
        let statistics = |start: Instant| SolverStatistics {
            elapsed: start.elapsed(),
            ..SolverStatistics::default()
        };

        if budget.cancel.is_cancelled() {
            return SolveOutcome::without_solution(
                TerminationReason::Aborted("Interrupt signal received".to_string()),
                &budget.cancel,
                statistics(start_time),
            );
        }

        // x[lesson, slot] in model order, one binary indicator per penalty term
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = problem.add_vector(variable().binary(), model.num_vars());
        let penalty_vars: Vec<Variable> =
            problem.add_vector(variable().binary(), model.penalties().len());
        trace!(
            "Generated {} assignment variables and {} penalty indicators.",
            vars.len(),
            penalty_vars.len()
        );

        let objective: Expression = model
            .penalties()
            .iter()
            .zip(&penalty_vars)
            .map(|(penalty, p)| f64::from(penalty.weight) * *p)
            .sum();
        info!("Objective function defined with consecutive-pair and daily-repeat penalties.");

        let mut solver_model = problem
            .minimise(objective)
            .using(default_solver)
            .set_option("threads", self.threads as i32)
            .set_option("random_seed", self.random_seed as i32)
            .set_option("log_to_console", self.verbose);
        if let Some(limit) = budget.time_limit {
            solver_model = solver_model.set_option("time_limit", limit.as_secs_f64());
        }

        info!("Adding {} hard constraints...", model.constraints().len());
        for c in model.constraints() {
            let occupied: Expression = c.vars.iter().map(|v| vars[v.0]).sum();
            match c.bound {
                Bound::Exactly(n) => {
                    solver_model.add_constraint(constraint!(occupied == f64::from(n)));
                }
                Bound::AtMost(n) => {
                    solver_model.add_constraint(constraint!(occupied <= f64::from(n)));
                }
            }
        }

        // p must be 1 once two or more of its n variables are set:
        // sum(x) <= 1 + (n - 1) * p
        info!("Linking {} penalty indicators...", penalty_vars.len());
        for (penalty, p) in model.penalties().iter().zip(&penalty_vars) {
            let slack = penalty.vars.len().saturating_sub(1) as f64;
            let occupied: Expression = penalty.vars.iter().map(|v| vars[v.0]).sum();
            let linked = occupied - slack * *p;
            solver_model.add_constraint(constraint!(linked <= 1));
        }

        if budget.cancel.is_cancelled() {
            return SolveOutcome::without_solution(
                TerminationReason::Aborted("Interrupt signal received".to_string()),
                &budget.cancel,
                statistics(start_time),
            );
        }

        info!("Starting ILP solver...");
        let solution = match solver_model.solve() {
            Ok(s) => s,
            Err(ResolutionError::Infeasible) => {
                info!("Solver proved the timetable infeasible in {:.2?}", start_time.elapsed());
                return SolveOutcome::without_solution(
                    TerminationReason::InfeasibilityProven,
                    &budget.cancel,
                    statistics(start_time),
                );
            }
            Err(e) => {
                warn!("No solution found. Solver error: {}", e);
                return SolveOutcome::without_solution(
                    TerminationReason::Aborted(e.to_string()),
                    &budget.cancel,
                    statistics(start_time),
                );
            }
        };
        let proven = matches!(solution.status(), SolutionStatus::Optimal);
        info!(
            "Solution found in {:.2?} ({})",
            start_time.elapsed(),
            if proven { "optimal" } else { "limit reached" }
        );

        let values = vars.iter().map(|v| solution.value(*v) > 0.5).collect();
        let reason = if proven {
            TerminationReason::OptimalityProven
        } else {
            TerminationReason::Aborted("time limit reached".to_string())
        };
        let mut stats = statistics(start_time);
        stats.solutions_found = 1;
        SolveOutcome::with_solution(model, Assignment::from_values(values), proven, reason, stats)
    }
}
