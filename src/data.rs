use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::RangeInclusive;

// Type aliases for clarity
pub type Slot = usize;
pub type ClassName = String;
pub type SubjectName = String;

pub const DEFAULT_DAYS: u32 = 5;
pub const DAYS_RANGE: RangeInclusive<u32> = 1..=7;
pub const PERIODS_RANGE: RangeInclusive<u32> = 1..=12;
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Shape of the teaching week: `days` × `periods_per_day` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    pub days: u32,
    pub periods_per_day: u32,
}

impl Week {
    pub fn new(days: u32, periods_per_day: u32) -> Self {
        Self {
            days,
            periods_per_day,
        }
    }

    /// A Monday to Friday week.
    pub fn school_week(periods_per_day: u32) -> Self {
        Self::new(DEFAULT_DAYS, periods_per_day)
    }

    pub fn slots(&self) -> usize {
        self.days as usize * self.periods_per_day as usize
    }

    /// Rejects weeks outside [`DAYS_RANGE`] × [`PERIODS_RANGE`].
    pub fn check(&self) -> Result<(), String> {
        if !DAYS_RANGE.contains(&self.days) {
            return Err(format!(
                "Days per week must be between {} and {}, got {}.",
                DAYS_RANGE.start(),
                DAYS_RANGE.end(),
                self.days
            ));
        }
        if !PERIODS_RANGE.contains(&self.periods_per_day) {
            return Err(format!(
                "Periods per day must be between {} and {}, got {}.",
                PERIODS_RANGE.start(),
                PERIODS_RANGE.end(),
                self.periods_per_day
            ));
        }
        Ok(())
    }

    pub fn slot(&self, day: u32, period: u32) -> Slot {
        day as Slot * self.periods_per_day as Slot + period as Slot
    }

    pub fn day_of(&self, slot: Slot) -> u32 {
        (slot / self.periods_per_day as Slot) as u32
    }

    pub fn period_of(&self, slot: Slot) -> u32 {
        (slot % self.periods_per_day as Slot) as u32
    }

    pub fn day_name(&self, day: u32) -> String {
        DAY_NAMES
            .get(day as usize)
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("Day {}", day + 1))
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days x {} periods ({} slots)",
            self.days,
            self.periods_per_day,
            self.slots()
        )
    }
}

/// A subject and the number of periods every class taking it needs per week.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subject {
    #[serde(rename = "Subject")]
    pub name: SubjectName,
    #[serde(rename = "Periods")]
    pub periods: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Teacher {
    #[serde(rename = "Teacher")]
    pub name: String,
    #[serde(rename = "Subject")]
    pub subject: SubjectName,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchoolClass {
    #[serde(rename = "class")]
    pub name: ClassName,
    pub subjects: Vec<SubjectName>,
}

impl SchoolClass {
    /// Subjects in listing order with duplicates dropped.
    pub fn distinct_subjects(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.subjects.len());
        for subject in &self.subjects {
            if !seen.contains(&subject.as_str()) {
                seen.push(subject.as_str());
            }
        }
        seen
    }
}

/// The complete, typed input document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Document {
    pub classes: Vec<SchoolClass>,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
}

impl Document {
    /// Deserializes an already validated raw document.
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Subject catalog. A later entry with the same name replaces an earlier one.
    pub fn subject_periods(&self) -> HashMap<&str, u32> {
        self.subjects
            .iter()
            .map(|s| (s.name.as_str(), s.periods))
            .collect()
    }

    /// Teacher catalog keyed by subject.
    ///
    /// Several teachers listed for one subject are not an error: the last entry
    /// wins and earlier ones are discarded.
    pub fn teacher_map(&self) -> HashMap<&str, &str> {
        self.teachers
            .iter()
            .map(|t| (t.subject.trim(), t.name.as_str()))
            .collect()
    }
}

/// Solver-level status of a successful report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchStatus {
    Optimal,
    Feasible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportStatus {
    Success,
    Fail,
}

/// Class -> slot -> subjects taught in that slot.
pub type Timetable = BTreeMap<ClassName, BTreeMap<Slot, Vec<SubjectName>>>;

/// The final output of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_status: Option<SearchStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timetable: Option<Timetable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_periods: Option<BTreeMap<ClassName, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_repeats: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periods_per_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_per_week: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_names: Option<Vec<ClassName>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ReportError>,
}

/// Validation finding as it appears in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    pub kind: String,
    pub message: String,
}

impl Report {
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: ReportStatus::Fail,
            search_status: None,
            timetable: None,
            free_periods: None,
            consecutive_repeats: None,
            objective_value: None,
            periods_per_day: None,
            days_per_week: None,
            class_names: None,
            message: Some(message.into()),
            errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReportStatus::Success
    }

    /// Week shape of a successful report.
    pub fn week(&self) -> Option<Week> {
        Some(Week::new(self.days_per_week?, self.periods_per_day?))
    }
}
