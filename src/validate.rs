//! Structural and semantic checks on a raw input document.
//!
//! The validator never stops at the first problem: every applicable finding is
//! collected so the caller can fix the whole document in one pass. Checks:
//! - the three top-level lists exist and are non-empty
//! - every record has its fields with the right JSON types
//! - class names are unique
//! - teacher and class references name catalogued subjects
//! - no subject or class needs more periods than the week has slots

use crate::data::Week;
use crate::error::{ErrorKind, ValidationError};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

const TOP_LEVEL_KEYS: [&str; 3] = ["classes", "subjects", "teachers"];

/// Validates a raw document against a week of `week.slots()` slots.
///
/// Returns every finding; an empty list means the document can be turned into
/// a [`crate::data::Document`].
pub fn validate_document(doc: &Value, week: Week) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let total_slots = week.slots() as u64;

    let Some(root) = doc.as_object() else {
        errors.push(schema("The document must be a JSON object."));
        return errors;
    };

    for key in TOP_LEVEL_KEYS {
        if !root.contains_key(key) {
            errors.push(schema(format!("Missing key: '{key}' in JSON data.")));
        }
    }

    let catalog = check_subjects(root, total_slots, &mut errors);
    check_teachers(root, &catalog, &mut errors);
    check_classes(root, &catalog, total_slots, &mut errors);

    errors
}

fn schema(message: impl Into<String>) -> ValidationError {
    ValidationError::new(ErrorKind::Schema, message)
}

/// Returns the records of a top-level list, or `None` after flagging it when it
/// is not a non-empty list. A missing key is flagged by the caller.
fn records<'a>(
    root: &'a Map<String, Value>,
    key: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a [Value]> {
    let value = root.get(key)?;
    match value.as_array() {
        Some(list) if !list.is_empty() => Some(list),
        _ => {
            errors.push(schema(format!("The '{key}' key must be a non-empty list.")));
            None
        }
    }
}

fn text<'a>(record: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn check_subjects<'a>(
    root: &'a Map<String, Value>,
    total_slots: u64,
    errors: &mut Vec<ValidationError>,
) -> HashMap<&'a str, u64> {
    let mut catalog = HashMap::new();
    let Some(subjects) = records(root, "subjects", errors) else {
        return catalog;
    };

    for (index, entry) in subjects.iter().enumerate() {
        let Some(record) = entry.as_object() else {
            errors.push(schema(format!("Subject entry #{} must be an object.", index + 1)));
            continue;
        };

        let name = text(record, "Subject");
        if name.is_none() {
            errors.push(schema("Each subject entry must have a 'Subject' field."));
        }
        let label = name.unwrap_or("<unknown>");

        let periods = match record.get("Periods") {
            Some(value) if value.is_u64() => value.as_u64(),
            Some(value) if value.is_i64() => {
                errors.push(schema(format!(
                    "Subject {label} must have a non-negative 'Periods' field."
                )));
                None
            }
            _ => {
                errors.push(schema(format!(
                    "Subject {label} must have an integer 'Periods' field."
                )));
                None
            }
        };

        if let Some(periods) = periods {
            if periods > total_slots {
                errors.push(ValidationError::new(
                    ErrorKind::Capacity,
                    format!(
                        "Subject '{label}' requires {periods} periods, which exceeds the total available slots ({total_slots})."
                    ),
                ));
            }
            if let Some(name) = name {
                catalog.insert(name, periods);
            }
        }
    }

    catalog
}

fn check_teachers(
    root: &Map<String, Value>,
    catalog: &HashMap<&str, u64>,
    errors: &mut Vec<ValidationError>,
) {
    let Some(teachers) = records(root, "teachers", errors) else {
        return;
    };

    for (index, entry) in teachers.iter().enumerate() {
        let Some(record) = entry.as_object() else {
            errors.push(schema(format!("Teacher entry #{} must be an object.", index + 1)));
            continue;
        };

        let name = text(record, "Teacher");
        if name.is_none() {
            errors.push(schema("Each teacher entry must have a 'Teacher' field."));
        }

        match text(record, "Subject") {
            None => errors.push(schema("Each teacher entry must have a 'Subject' field.")),
            Some(subject) if !catalog.contains_key(subject.trim()) => {
                errors.push(ValidationError::new(
                    ErrorKind::Reference,
                    format!(
                        "Teacher '{}' is assigned to subject '{}', which is not defined in subjects list.",
                        name.unwrap_or("<unknown>"),
                        subject
                    ),
                ));
            }
            Some(_) => {}
        }
    }
}

fn check_classes(
    root: &Map<String, Value>,
    catalog: &HashMap<&str, u64>,
    total_slots: u64,
    errors: &mut Vec<ValidationError>,
) {
    let Some(classes) = records(root, "classes", errors) else {
        return;
    };

    let mut names = HashSet::new();
    for (index, entry) in classes.iter().enumerate() {
        let Some(record) = entry.as_object() else {
            errors.push(schema(format!("Class entry #{} must be an object.", index + 1)));
            continue;
        };

        let name = text(record, "class");
        match name {
            None => errors.push(schema("Each class entry must have a 'class' field.")),
            Some(name) if !names.insert(name) => {
                errors.push(schema(format!("Class '{name}' is defined more than once.")));
            }
            Some(_) => {}
        }
        let label = name.unwrap_or("<unknown>");

        let subjects = match record.get("subjects").and_then(Value::as_array) {
            Some(list) if !list.is_empty() => list,
            _ => {
                errors.push(schema(format!(
                    "Class '{label}' must have a non-empty list of 'subjects'."
                )));
                continue;
            }
        };

        let mut counted: Vec<&str> = Vec::with_capacity(subjects.len());
        let mut class_total_periods = 0u64;
        for subject in subjects {
            let Some(subject) = subject.as_str() else {
                errors.push(schema(format!(
                    "Class '{label}' lists a subject that is not a string: {subject}."
                )));
                continue;
            };
            if counted.contains(&subject) {
                continue;
            }
            counted.push(subject);

            match catalog.get(subject) {
                Some(periods) => class_total_periods += periods,
                None => errors.push(ValidationError::new(
                    ErrorKind::Reference,
                    format!(
                        "Subject '{subject}' in class '{label}' is not defined in the subjects list."
                    ),
                )),
            }
        }

        if class_total_periods > total_slots {
            errors.push(ValidationError::new(
                ErrorKind::Capacity,
                format!(
                    "Total periods required for class '{label}' is {class_total_periods}, which exceeds available slots ({total_slots})."
                ),
            ));
        }
    }
}
