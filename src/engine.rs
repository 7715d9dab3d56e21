//! The end-to-end pipeline: validate, build, search, extract.

use crate::config::AppConfig;
use crate::data::{Document, Report, SearchStatus, Week};
use crate::error::{ErrorKind, Result, TimetableError, ValidationError};
use crate::extract::extract_report;
use crate::model::TimetableModel;
use crate::solver::{self, CancelToken, SolveStatus};
use crate::validate::validate_document;
use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A raw document together with the week it should be scheduled into.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub document: Value,
    pub periods_per_day: u32,
    /// Falls back to the configured number of days.
    #[serde(default)]
    pub days_per_week: Option<u32>,
}

impl SolveRequest {
    pub fn new(document: Value, periods_per_day: u32) -> Self {
        Self {
            document,
            periods_per_day,
            days_per_week: None,
        }
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days_per_week = Some(days);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: AppConfig,
}

impl Engine {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn week_for(&self, request: &SolveRequest) -> Week {
        Week::new(
            request.days_per_week.unwrap_or(self.config.week.days),
            request.periods_per_day,
        )
    }

    /// Every validation finding for the request's document. A week outside the
    /// supported shape is the only finding, the document is not inspected.
    pub fn validate(&self, request: &SolveRequest) -> Vec<ValidationError> {
        let week = self.week_for(request);
        match week.check() {
            Ok(()) => validate_document(&request.document, week),
            Err(message) => vec![ValidationError::new(ErrorKind::Schema, message)],
        }
    }

    /// Validates the document and builds the model for it.
    pub fn prepare(&self, request: &SolveRequest) -> Result<TimetableModel> {
        let week = self.week_for(request);
        week.check().map_err(TimetableError::Schema)?;
        let errors = validate_document(&request.document, week);
        if !errors.is_empty() {
            warn!("Document rejected with {} validation error(s).", errors.len());
            return Err(TimetableError::Validation(errors));
        }
        let doc = Document::from_value(request.document.clone())?;
        TimetableModel::build(&doc, week, &self.config.model)
    }

    /// Runs the whole pipeline on the calling thread.
    pub fn solve_blocking(&self, request: &SolveRequest, cancel: &CancelToken) -> Result<Report> {
        let model = self.prepare(request)?;
        let solver = solver::from_settings(&self.config.solver);
        info!("Solving {} with the {} solver...", model.week(), solver.name());

        let outcome = solver.solve(&model, &self.config.budget(cancel.clone()));
        info!(
            "Search finished: {} ({}) after {} nodes in {:.2?}",
            outcome.status,
            outcome.reason,
            outcome.statistics.nodes,
            outcome.statistics.elapsed
        );

        let search_status = match outcome.status {
            SolveStatus::Optimal => SearchStatus::Optimal,
            SolveStatus::Feasible => SearchStatus::Feasible,
            SolveStatus::Infeasible => return Err(TimetableError::Infeasible),
            SolveStatus::Cancelled => return Err(TimetableError::Cancelled),
        };
        let assignment = outcome.assignment.ok_or(TimetableError::Infeasible)?;
        Ok(extract_report(&model, &assignment, search_status))
    }

    /// Runs the pipeline on the blocking thread pool.
    pub async fn solve(self: Arc<Self>, request: SolveRequest, cancel: CancelToken) -> Result<Report> {
        tokio::task::spawn_blocking(move || self.solve_blocking(&request, &cancel)).await?
    }

    /// Starts a solve in the background and returns a handle to cancel or await it.
    pub fn spawn(self: Arc<Self>, request: SolveRequest) -> SolveHandle {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let task = tokio::task::spawn_blocking(move || self.solve_blocking(&request, &token));
        SolveHandle { cancel, task }
    }
}

/// A background solve started by [`Engine::spawn`].
pub struct SolveHandle {
    cancel: CancelToken,
    task: JoinHandle<Result<Report>>,
}

impl SolveHandle {
    /// Asks the search to stop. The backtracking engine stops at its next node.
    /// The MILP backend only sees the request before HiGHS starts; a running
    /// HiGHS solve ends at `solver.time_limit_secs`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<Report> {
        self.task.await?
    }
}
