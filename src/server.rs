use crate::config::AppConfig;
use crate::data::Report;
use crate::engine::{Engine, SolveRequest};
use crate::error::{Result, TimetableError, ValidationError};
use crate::extract::report_for_error;
use crate::import::{CsvTables, import_document};
use crate::solver::CancelToken;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

/// HTTP status for a failed solve.
pub fn status_for(err: &TimetableError) -> StatusCode {
    match err {
        TimetableError::Infeasible | TimetableError::Cancelled => StatusCode::UNPROCESSABLE_ENTITY,
        TimetableError::Join(_) | TimetableError::Io(_) | TimetableError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn validate_handler(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SolveRequest>,
) -> Json<ValidationResponse> {
    let errors = engine.validate(&request);
    Json(ValidationResponse {
        valid: errors.is_empty(),
        errors,
    })
}

async fn solve_handler(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<SolveRequest>,
) -> std::result::Result<Json<Report>, (StatusCode, Json<Report>)> {
    match engine.solve(request, CancelToken::new()).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            warn!("Solve request failed: {}", e);
            Err((status_for(&e), Json(report_for_error(&e))))
        }
    }
}

async fn import_handler(
    Json(tables): Json<CsvTables>,
) -> std::result::Result<Json<Value>, (StatusCode, String)> {
    import_document(&tables)
        .map(Json)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/timetable/validate", post(validate_handler))
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/import", post(import_handler))
        .with_state(engine)
}

pub async fn run_server(config: AppConfig) -> Result<()> {
    let addr = config.server.addr.clone();
    let app = router(Arc::new(Engine::new(config)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
