//! Step-by-step collection of everything a solve request needs.
//!
//! [`IntakeSession`] is a plain value: each [`IntakeEvent`] consumes the
//! session and returns the next one, so a front end only has to store the
//! latest session between interactions.

use crate::data::{DAYS_RANGE, PERIODS_RANGE};
use crate::engine::SolveRequest;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_PERIODS_PER_DAY: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntakeStep {
    SchoolName,
    PeriodsPerDay,
    DaysPerWeek,
    UploadDocument,
    Review,
    Submitted,
}

impl IntakeStep {
    /// 1-based position out of [`IntakeStep::COUNT`].
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub const COUNT: usize = 6;

    fn next(self) -> Self {
        match self {
            IntakeStep::SchoolName => IntakeStep::PeriodsPerDay,
            IntakeStep::PeriodsPerDay => IntakeStep::DaysPerWeek,
            IntakeStep::DaysPerWeek => IntakeStep::UploadDocument,
            IntakeStep::UploadDocument => IntakeStep::Review,
            IntakeStep::Review | IntakeStep::Submitted => IntakeStep::Submitted,
        }
    }

    fn previous(self) -> Self {
        match self {
            IntakeStep::SchoolName | IntakeStep::PeriodsPerDay => IntakeStep::SchoolName,
            IntakeStep::DaysPerWeek => IntakeStep::PeriodsPerDay,
            IntakeStep::UploadDocument => IntakeStep::DaysPerWeek,
            IntakeStep::Review => IntakeStep::UploadDocument,
            IntakeStep::Submitted => IntakeStep::Review,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntakeEvent {
    SchoolName(String),
    PeriodsPerDay(u32),
    DaysPerWeek(u32),
    /// Raw text of the uploaded JSON file.
    Upload(String),
    Next,
    Back,
}

#[derive(Debug, Error, PartialEq)]
pub enum IntakeError {
    #[error("School name must not be empty.")]
    EmptySchoolName,

    #[error("Periods per day must be between 1 and 12, got {0}.")]
    PeriodsOutOfRange(u32),

    #[error("Days per week must be between 1 and 7, got {0}.")]
    DaysOutOfRange(u32),

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON must be an object or array.")]
    NotAnObjectOrArray,

    #[error("Upload a document before continuing.")]
    MissingDocument,

    #[error("{event} is not accepted at step {step:?}.")]
    UnexpectedEvent { step: IntakeStep, event: String },

    #[error("The intake has not been submitted yet.")]
    NotSubmitted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntakeSession {
    step: IntakeStep,
    school_name: String,
    periods_per_day: u32,
    days_per_week: u32,
    document: Option<Value>,
}

impl Default for IntakeSession {
    fn default() -> Self {
        Self {
            step: IntakeStep::SchoolName,
            school_name: String::new(),
            periods_per_day: DEFAULT_PERIODS_PER_DAY,
            days_per_week: crate::data::DEFAULT_DAYS,
            document: None,
        }
    }
}

impl IntakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> IntakeStep {
        self.step
    }

    pub fn school_name(&self) -> &str {
        &self.school_name
    }

    pub fn periods_per_day(&self) -> u32 {
        self.periods_per_day
    }

    pub fn days_per_week(&self) -> u32 {
        self.days_per_week
    }

    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref()
    }

    /// Fraction of the flow completed, 0.0 on the first step and 1.0 once submitted.
    pub fn progress(&self) -> f64 {
        (self.step.number() - 1) as f64 / (IntakeStep::COUNT - 1) as f64
    }

    /// Applies `event`. A rejected event leaves the session unchanged and
    /// hands it back alongside the error.
    pub fn apply(mut self, event: IntakeEvent) -> Result<Self, (Self, IntakeError)> {
        let result = match (self.step, event) {
            (IntakeStep::SchoolName, IntakeEvent::SchoolName(name)) => {
                let name = name.trim();
                if name.is_empty() {
                    Err(IntakeError::EmptySchoolName)
                } else {
                    // entering the name also advances, like pressing enter
                    self.school_name = name.to_string();
                    self.step = self.step.next();
                    Ok(())
                }
            }
            (IntakeStep::PeriodsPerDay, IntakeEvent::PeriodsPerDay(periods)) => {
                if PERIODS_RANGE.contains(&periods) {
                    self.periods_per_day = periods;
                    Ok(())
                } else {
                    Err(IntakeError::PeriodsOutOfRange(periods))
                }
            }
            (IntakeStep::DaysPerWeek, IntakeEvent::DaysPerWeek(days)) => {
                if DAYS_RANGE.contains(&days) {
                    self.days_per_week = days;
                    Ok(())
                } else {
                    Err(IntakeError::DaysOutOfRange(days))
                }
            }
            (IntakeStep::UploadDocument, IntakeEvent::Upload(text)) => parse_upload(&text)
                .map(|document| {
                    self.document = Some(document);
                }),
            (IntakeStep::SchoolName, IntakeEvent::Next) if self.school_name.is_empty() => {
                Err(IntakeError::EmptySchoolName)
            }
            (IntakeStep::UploadDocument, IntakeEvent::Next) if self.document.is_none() => {
                Err(IntakeError::MissingDocument)
            }
            (IntakeStep::Submitted, event @ IntakeEvent::Next) => Err(IntakeError::UnexpectedEvent {
                step: self.step,
                event: format!("{event:?}"),
            }),
            (_, IntakeEvent::Next) => {
                self.step = self.step.next();
                Ok(())
            }
            (IntakeStep::Submitted, event @ IntakeEvent::Back) => {
                Err(IntakeError::UnexpectedEvent {
                    step: self.step,
                    event: format!("{event:?}"),
                })
            }
            (_, IntakeEvent::Back) => {
                self.step = self.step.previous();
                Ok(())
            }
            (step, event) => Err(IntakeError::UnexpectedEvent {
                step,
                event: format!("{event:?}"),
            }),
        };
        match result {
            Ok(()) => Ok(self),
            Err(err) => Err((self, err)),
        }
    }

    /// The solve request for a submitted session.
    pub fn into_request(self) -> Result<SolveRequest, IntakeError> {
        if self.step != IntakeStep::Submitted {
            return Err(IntakeError::NotSubmitted);
        }
        let document = self.document.ok_or(IntakeError::MissingDocument)?;
        Ok(SolveRequest::new(document, self.periods_per_day).with_days(self.days_per_week))
    }
}

fn parse_upload(text: &str) -> Result<Value, IntakeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| IntakeError::InvalidJson(e.to_string()))?;
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(IntakeError::NotAnObjectOrArray)
    }
}
