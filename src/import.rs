//! Builds an input document from three spreadsheet exports.
//!
//! | table    | columns                                   |
//! |----------|-------------------------------------------|
//! | classes  | `Class`, `Subjects` (joined with `;`)     |
//! | subjects | `Subject`, `Periods`                      |
//! | teachers | `Teacher`, `Subject`                      |
//!
//! The result is an unvalidated [`serde_json::Value`]: cells are copied as
//! text (integer `Periods` become JSON numbers) so the validator reports bad
//! data with its usual messages.

use crate::error::{Result, TimetableError};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::io::Read;
use std::path::Path;

const PERIODS_COLUMN: &str = "Periods";

/// CSV text of the three tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CsvTables {
    pub classes: String,
    pub subjects: String,
    pub teachers: String,
}

impl CsvTables {
    pub fn from_files(
        classes: impl AsRef<Path>,
        subjects: impl AsRef<Path>,
        teachers: impl AsRef<Path>,
    ) -> Result<Self> {
        Ok(Self {
            classes: std::fs::read_to_string(classes)?,
            subjects: std::fs::read_to_string(subjects)?,
            teachers: std::fs::read_to_string(teachers)?,
        })
    }
}

pub fn import_document(tables: &CsvTables) -> Result<Value> {
    let classes = read_records(tables.classes.as_bytes())?
        .into_iter()
        .map(class_entry)
        .collect::<Result<Vec<_>>>()?;
    let subjects = read_records(tables.subjects.as_bytes())?;
    let teachers = read_records(tables.teachers.as_bytes())?;
    debug!(
        "Imported {} classes, {} subjects and {} teachers.",
        classes.len(),
        subjects.len(),
        teachers.len()
    );

    Ok(json!({
        "classes": classes,
        "subjects": subjects.into_iter().map(Value::Object).collect::<Vec<_>>(),
        "teachers": teachers.into_iter().map(Value::Object).collect::<Vec<_>>(),
    }))
}

/// Reads a headed table into one JSON object per row.
fn read_records(input: impl Read) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), cell_value(header, cell)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Only `Periods` cells holding an integer become numbers; names stay text
/// even when they look numeric.
fn cell_value(header: &str, cell: &str) -> Value {
    match (header, cell.parse::<i64>()) {
        (PERIODS_COLUMN, Ok(n)) => Value::from(n),
        _ => Value::String(cell.to_string()),
    }
}

fn class_entry(row: Map<String, Value>) -> Result<Value> {
    let name = row
        .get("Class")
        .cloned()
        .ok_or_else(|| TimetableError::Schema("The classes table needs a 'Class' column.".into()))?;
    let joined = row.get("Subjects").and_then(Value::as_str).ok_or_else(|| {
        TimetableError::Schema("The classes table needs a 'Subjects' column.".into())
    })?;
    let subjects: Vec<Value> = joined
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Value::String(s.to_string()))
        .collect();
    Ok(json!({ "class": name, "subjects": subjects }))
}
