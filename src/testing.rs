//! Builders shared by unit tests.

use crate::data::{Document, SchoolClass, Subject, Teacher};

pub(crate) fn document(
    classes: &[(&str, &[&str])],
    subjects: &[(&str, u32)],
    teachers: &[(&str, &str)],
) -> Document {
    Document {
        classes: classes
            .iter()
            .map(|(name, subjects)| SchoolClass {
                name: name.to_string(),
                subjects: subjects.iter().map(|s| s.to_string()).collect(),
            })
            .collect(),
        subjects: subjects
            .iter()
            .map(|(name, periods)| Subject {
                name: name.to_string(),
                periods: *periods,
            })
            .collect(),
        teachers: teachers
            .iter()
            .map(|(name, subject)| Teacher {
                name: name.to_string(),
                subject: subject.to_string(),
            })
            .collect(),
    }
}
