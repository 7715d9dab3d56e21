use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Category of a problem found in an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Missing or mistyped key or record field.
    Schema,
    /// A subject or teacher reference points to an undefined entity.
    Reference,
    /// Required periods exceed the available slots.
    Capacity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Schema => "schema",
            ErrorKind::Reference => "reference",
            ErrorKind::Capacity => "capacity",
        };
        f.write_str(name)
    }
}

/// One finding of the document validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

#[derive(Debug, Error)]
pub enum TimetableError {
    #[error("document failed validation with {} error(s)", .0.len())]
    Validation(Vec<ValidationError>),

    #[error("{0}")]
    Schema(String),

    #[error("{0}")]
    Reference(String),

    #[error("{0}")]
    Capacity(String),

    #[error("No teachers assigned for subjects: {}", .0.join(", "))]
    Staffing(Vec<String>),

    #[error("No feasible solution. Try adjusting the constraints.")]
    Infeasible,

    #[error("Search was cancelled before a feasible timetable was found.")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("solver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, TimetableError>;
