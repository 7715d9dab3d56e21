//! Turns a solved assignment into the report handed back to callers.

use crate::data::{Report, ReportError, ReportStatus, SearchStatus, Timetable};
use crate::error::TimetableError;
use crate::model::{Assignment, TimetableModel};
use itertools::Itertools;
use log::debug;
use std::collections::BTreeMap;

/// Builds the success report for a feasible `assignment`.
///
/// Free periods and consecutive repeats are recounted from the grid itself,
/// not from the penalty terms the solver optimized.
pub fn extract_report(
    model: &TimetableModel,
    assignment: &Assignment,
    search_status: SearchStatus,
) -> Report {
    let week = model.week();
    let slots = week.slots();
    let lessons = model.lessons();

    let mut timetable = Timetable::new();
    let mut free_periods = BTreeMap::new();
    let mut consecutive_repeats = 0;

    for class in model.classes() {
        let mut grid: BTreeMap<_, Vec<String>> = (0..slots).map(|s| (s, Vec::new())).collect();
        for &lesson in &class.lessons {
            for slot in model.lesson_slots(assignment, lesson) {
                if let Some(cell) = grid.get_mut(&slot) {
                    cell.push(lessons[lesson].subject.clone());
                }
            }
        }

        let repeats = grid
            .values()
            .tuple_windows()
            .filter(|(current, next)| match (current.first(), next.first()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            })
            .count();
        let free = grid.values().filter(|cell| cell.is_empty()).count();
        debug!("{}: {} free periods, {} consecutive repeats", class.name, free, repeats);

        consecutive_repeats += repeats;
        free_periods.insert(class.name.clone(), free);
        timetable.insert(class.name.clone(), grid);
    }

    Report {
        status: ReportStatus::Success,
        search_status: Some(search_status),
        timetable: Some(timetable),
        free_periods: Some(free_periods),
        consecutive_repeats: Some(consecutive_repeats),
        objective_value: Some(f64::from(model.objective(assignment))),
        periods_per_day: Some(week.periods_per_day),
        days_per_week: Some(week.days),
        class_names: Some(model.classes().iter().map(|c| c.name.clone()).collect()),
        message: None,
        errors: Vec::new(),
    }
}

/// Fail report for an error raised anywhere in the pipeline.
pub fn report_for_error(err: &TimetableError) -> Report {
    match err {
        TimetableError::Validation(errors) => Report {
            errors: errors
                .iter()
                .map(|e| ReportError {
                    kind: e.kind.to_string(),
                    message: e.message.clone(),
                })
                .collect(),
            ..Report::fail(err.to_string())
        },
        _ => Report::fail(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Week;
    use crate::error::{ErrorKind, ValidationError};
    use crate::model::ModelOptions;
    use crate::testing::document;
    use serde_json::json;

    fn assign(model: &TimetableModel, picks: &[(usize, &[usize])]) -> Assignment {
        let mut assignment = Assignment::empty(model.num_vars());
        for (lesson, slots) in picks {
            for &slot in *slots {
                assignment.set(model.var(*lesson, slot), true);
            }
        }
        assignment
    }

    #[test]
    fn grid_covers_every_slot_and_counts_free_periods() {
        let doc = document(
            &[("B", &["Math", "Art"]), ("A", &["Art"])],
            &[("Math", 2), ("Art", 1)],
            &[("Smith", "Math"), ("Davis", "Art")],
        );
        let options = ModelOptions {
            run_window_limit: 2,
            ..ModelOptions::default()
        };
        let model = TimetableModel::build(&doc, Week::new(2, 2), &options).unwrap();
        // B: Math in 0 and 1, Art in 3; A: Art in 2
        let assignment = assign(&model, &[(0, &[0, 1]), (1, &[3]), (2, &[2])]);
        assert!(model.is_feasible(&assignment));

        let report = extract_report(&model, &assignment, SearchStatus::Optimal);
        let timetable = report.timetable.as_ref().unwrap();

        assert_eq!(timetable["B"].len(), 4);
        assert_eq!(timetable["B"][&0], vec!["Math".to_string()]);
        assert!(timetable["B"][&2].is_empty());
        assert_eq!(report.free_periods.as_ref().unwrap()["A"], 3);
        assert_eq!(report.free_periods.as_ref().unwrap()["B"], 1);
        assert_eq!(report.consecutive_repeats, Some(1));
        // only the Math pair in slots 0 and 1 is penalized
        assert_eq!(report.objective_value, Some(3.0));
        assert_eq!(report.class_names, Some(vec!["B".to_string(), "A".to_string()]));
        assert_eq!(report.week(), Some(Week::new(2, 2)));
    }

    #[test]
    fn report_serializes_in_camel_case() {
        let doc = document(&[("A", &["Math"])], &[("Math", 1)], &[("Smith", "Math")]);
        let model = TimetableModel::build(&doc, Week::new(1, 2), &ModelOptions::default()).unwrap();
        let assignment = assign(&model, &[(0, &[1])]);

        let value = serde_json::to_value(extract_report(&model, &assignment, SearchStatus::Feasible))
            .unwrap();
        assert_eq!(
            value,
            json!({
                "status": "success",
                "searchStatus": "feasible",
                "timetable": {"A": {"0": [], "1": ["Math"]}},
                "freePeriods": {"A": 1},
                "consecutiveRepeats": 0,
                "objectiveValue": 0.0,
                "periodsPerDay": 2,
                "daysPerWeek": 1,
                "classNames": ["A"]
            })
        );
    }

    #[test]
    fn validation_errors_are_listed_in_fail_report() {
        let err = TimetableError::Validation(vec![ValidationError::new(
            ErrorKind::Reference,
            "Subject 'Art' in class 'A' is not defined in the subjects list.",
        )]);
        let report = report_for_error(&err);

        assert!(!report.is_success());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, "reference");
    }

    #[test]
    fn infeasible_report_carries_message() {
        let report = report_for_error(&TimetableError::Infeasible);
        assert_eq!(
            report.message.as_deref(),
            Some("No feasible solution. Try adjusting the constraints.")
        );
        assert!(report.timetable.is_none());
    }
}
