use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use timetable_solver::config::{AppConfig, SolverBackend};
use timetable_solver::data::{Document, Report, SearchStatus, Week};
use timetable_solver::engine::{Engine, SolveRequest};
use timetable_solver::error::ErrorKind;
use timetable_solver::fixtures::{Defect, FixtureGenerator};
use timetable_solver::solver::CancelToken;
use timetable_solver::TimetableError;

const BACKENDS: [SolverBackend; 2] = [SolverBackend::Milp, SolverBackend::Backtracking];

fn engine(backend: SolverBackend) -> Engine {
    let mut config = AppConfig::default();
    config.solver.backend = backend;
    config.solver.time_limit_secs = 10;
    Engine::new(config)
}

fn solve(backend: SolverBackend, request: &SolveRequest) -> Result<Report, TimetableError> {
    engine(backend).solve_blocking(request, &CancelToken::new())
}

/// Checks every hard rule directly on the report grid.
fn assert_timetable_respects_rules(document: &Value, week: Week, report: &Report) {
    let doc = Document::from_value(document.clone()).unwrap();
    let periods = doc.subject_periods();
    let teachers = doc.teacher_map();
    let timetable = report.timetable.as_ref().expect("success carries a timetable");

    let mut teacher_slots: HashMap<(&str, usize), &str> = HashMap::new();
    for class in &doc.classes {
        let grid = &timetable[&class.name];
        assert_eq!(grid.len(), week.slots(), "{} grid covers the week", class.name);

        for subject in class.distinct_subjects() {
            let taught: Vec<usize> = (0..week.slots())
                .filter(|slot| grid[slot].iter().any(|s| s == subject))
                .collect();
            assert_eq!(
                taught.len() as u32,
                periods[subject],
                "{} gets every period of {subject}",
                class.name
            );
            for run in taught.windows(3) {
                assert!(run[2] - run[0] > 2, "{} has a triple run of {subject}", class.name);
            }
            for &slot in &taught {
                let teacher = teachers[subject];
                if let Some(other) = teacher_slots.insert((teacher, slot), &class.name) {
                    panic!("{teacher} teaches {other} and {} in slot {slot}", class.name);
                }
            }
        }

        for (slot, subjects) in grid {
            assert!(subjects.len() <= 1, "{} slot {slot} holds {subjects:?}", class.name);
        }
        let free = grid.values().filter(|s| s.is_empty()).count();
        assert_eq!(report.free_periods.as_ref().unwrap()[&class.name], free);
    }
}

#[test]
fn single_class_example_leaves_expected_free_periods() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math"]}],
        "subjects": [{"Subject": "Math", "Periods": 5}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let request = SolveRequest::new(document.clone(), 8);

    for backend in BACKENDS {
        let report = solve(backend, &request).unwrap();
        assert!(report.is_success());
        assert_eq!(report.search_status, Some(SearchStatus::Optimal), "{backend:?}");
        assert_eq!(report.free_periods.as_ref().unwrap()["A"], 35);
        assert_eq!(report.consecutive_repeats, Some(0));
        assert_eq!(report.objective_value, Some(0.0));
        assert_timetable_respects_rules(&document, Week::school_week(8), &report);
    }
}

#[test]
fn over_capacity_subject_fails_validation() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math"]}],
        "subjects": [{"Subject": "Math", "Periods": 41}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let err = solve(SolverBackend::Milp, &SolveRequest::new(document, 8)).unwrap_err();

    match err {
        TimetableError::Validation(errors) => {
            assert!(errors.iter().all(|e| e.kind == ErrorKind::Capacity));
            assert!(errors[0].message.contains("41"));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn two_full_classes_with_one_teacher_are_infeasible() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math"]}, {"class": "B", "subjects": ["Math"]}],
        "subjects": [{"Subject": "Math", "Periods": 40}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let request = SolveRequest::new(document, 8);

    for backend in BACKENDS {
        let err = solve(backend, &request).unwrap_err();
        assert!(matches!(err, TimetableError::Infeasible), "{backend:?}: {err}");
        assert_eq!(err.to_string(), "No feasible solution. Try adjusting the constraints.");
    }
}

#[test]
fn undefined_subject_is_a_reference_error() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math", "Geography"]}],
        "subjects": [{"Subject": "Math", "Periods": 5}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let err = solve(SolverBackend::Backtracking, &SolveRequest::new(document, 8)).unwrap_err();

    match err {
        TimetableError::Validation(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].kind, ErrorKind::Reference);
            assert!(errors[0].message.contains("Geography"));
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn unstaffed_subject_is_reported_before_search() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math"]}],
        "subjects": [{"Subject": "Math", "Periods": 5}, {"Subject": "Art", "Periods": 2}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let err = solve(SolverBackend::Milp, &SolveRequest::new(document, 8)).unwrap_err();
    assert_eq!(err.to_string(), "No teachers assigned for subjects: Art");
}

#[test]
fn generated_documents_solve_on_both_backends() {
    for seed in [3, 11] {
        let document = FixtureGenerator::new(seed).document(2);
        let request = SolveRequest::new(document.clone(), 6);
        for backend in BACKENDS {
            let report = solve(backend, &request)
                .unwrap_or_else(|e| panic!("seed {seed} on {backend:?}: {e}"));
            assert_timetable_respects_rules(&document, Week::school_week(6), &report);
        }
    }
}

#[test]
fn teacher_of_two_subjects_is_never_double_booked() {
    let document = json!({
        "classes": [
            {"class": "A", "subjects": ["Math", "Art", "History"]},
            {"class": "B", "subjects": ["Math", "Art", "History"]}
        ],
        "subjects": [
            {"Subject": "Math", "Periods": 4},
            {"Subject": "Art", "Periods": 3},
            {"Subject": "History", "Periods": 3}
        ],
        "teachers": [
            {"Teacher": "Mr. Smith", "Subject": "Math"},
            {"Teacher": "Mrs. Davis", "Subject": "Art"},
            {"Teacher": "Mrs. Davis", "Subject": "History"}
        ]
    });
    let week = Week::school_week(6);
    let request = SolveRequest::new(document.clone(), 6);

    for backend in BACKENDS {
        let report = solve(backend, &request).unwrap();
        assert_timetable_respects_rules(&document, week, &report);

        let timetable = report.timetable.as_ref().unwrap();
        let davis_slots = (0..week.slots())
            .filter(|slot| {
                ["A", "B"].iter().any(|class| {
                    timetable[*class][slot]
                        .iter()
                        .any(|s| s == "Art" || s == "History")
                })
            })
            .count();
        assert_eq!(davis_slots, 12, "{backend:?}");
    }
}

#[test]
fn repeated_class_name_fails_validation() {
    let document = json!({
        "classes": [
            {"class": "A", "subjects": ["Math"]},
            {"class": "A", "subjects": ["Art"]}
        ],
        "subjects": [{"Subject": "Math", "Periods": 3}, {"Subject": "Art", "Periods": 2}],
        "teachers": [
            {"Teacher": "Mr. Smith", "Subject": "Math"},
            {"Teacher": "Mrs. Davis", "Subject": "Art"}
        ]
    });
    let err = solve(SolverBackend::Backtracking, &SolveRequest::new(document, 4)).unwrap_err();

    match err {
        TimetableError::Validation(errors) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].kind, ErrorKind::Schema);
        }
        other => panic!("expected validation errors, got {other:?}"),
    }
}

#[test]
fn oversized_week_is_rejected_on_both_backends() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math"]}],
        "subjects": [{"Subject": "Math", "Periods": 1}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let request = SolveRequest::new(document, u32::MAX).with_days(7);

    for backend in BACKENDS {
        let err = solve(backend, &request).unwrap_err();
        assert!(matches!(err, TimetableError::Schema(_)), "{backend:?}: {err}");
    }
}

#[test]
fn backends_agree_on_the_optimum() {
    // 4 periods a day force at least one repeated period for five lessons
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math", "Art"]}],
        "subjects": [{"Subject": "Math", "Periods": 5}, {"Subject": "Art", "Periods": 2}],
        "teachers": [
            {"Teacher": "Mr. Smith", "Subject": "Math"},
            {"Teacher": "Mrs. Davis", "Subject": "Art"}
        ]
    });
    let request = SolveRequest::new(document, 4);

    let milp = solve(SolverBackend::Milp, &request).unwrap();
    let backtracking = solve(SolverBackend::Backtracking, &request).unwrap();
    assert_eq!(milp.search_status, Some(SearchStatus::Optimal));
    assert_eq!(backtracking.search_status, Some(SearchStatus::Optimal));
    assert_eq!(milp.objective_value, backtracking.objective_value);
    assert_eq!(milp.objective_value, Some(1.0));
}

#[test]
fn custom_week_length_is_honored() {
    let document = json!({
        "classes": [{"class": "A", "subjects": ["Math"]}],
        "subjects": [{"Subject": "Math", "Periods": 3}],
        "teachers": [{"Teacher": "Mr. Smith", "Subject": "Math"}]
    });
    let request = SolveRequest::new(document.clone(), 4).with_days(3);

    for backend in BACKENDS {
        let report = solve(backend, &request).unwrap();
        assert_eq!(report.days_per_week, Some(3));
        assert_eq!(report.timetable.as_ref().unwrap()["A"].len(), 12);
        assert_timetable_respects_rules(&document, Week::new(3, 4), &report);
    }
}

#[test]
fn validation_is_idempotent_for_defective_fixtures() {
    let week = Week::school_week(8);
    for defect in [Defect::MissingKey, Defect::WrongType, Defect::UndefinedSubject] {
        let document = FixtureGenerator::new(5).document_with_defect(3, defect, week);
        let request = SolveRequest::new(document, 8);
        let engine = engine(SolverBackend::Milp);
        let first = engine.validate(&request);
        assert!(!first.is_empty(), "{defect:?}");
        assert_eq!(first, engine.validate(&request));
    }
}

#[tokio::test]
async fn concurrent_requests_run_independently() {
    let engine = Arc::new(engine(SolverBackend::Backtracking));
    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let document = FixtureGenerator::new(seed).document(1);
            engine.clone().spawn(SolveRequest::new(document, 6))
        })
        .collect();

    for handle in handles {
        let report = handle.join().await.unwrap();
        assert!(report.is_success());
    }
}

#[tokio::test]
async fn cancelled_solve_reports_cancellation() {
    let engine = Arc::new(engine(SolverBackend::Backtracking));
    let cancel = CancelToken::new();
    cancel.cancel();
    let document = FixtureGenerator::new(1).document(2);

    let err = engine
        .solve(SolveRequest::new(document, 6), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, TimetableError::Cancelled));
}
