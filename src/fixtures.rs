//! Seeded generator of sample input documents, optionally with one defect.

use crate::data::Week;
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

/// Subject catalog shared by every generated document.
pub const SAMPLE_SUBJECTS: [(&str, u32); 5] = [
    ("Math", 5),
    ("English", 4),
    ("Science", 4),
    ("History", 3),
    ("Art", 2),
];

/// Math has two teachers; the second one takes the subject.
pub const SAMPLE_TEACHERS: [(&str, &str); 6] = [
    ("Mr. Smith", "Math"),
    ("Ms. Johnson", "English"),
    ("Dr. Brown", "Science"),
    ("Prof. Lee", "History"),
    ("Mrs. Davis", "Art"),
    ("Ms. Clark", "Math"),
];

/// A single fault injected into an otherwise valid document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Defect {
    /// Drop one of the top-level lists.
    MissingKey,
    /// Drop a required field from one record.
    MissingField,
    /// Give a field a value of the wrong JSON type.
    WrongType,
    /// Add a subject outside the catalog to one class.
    UndefinedSubject,
    /// Make one subject need more periods than the week has.
    OverCapacity,
}

pub struct FixtureGenerator {
    rng: StdRng,
}

impl FixtureGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// "Grade 10A", "Grade 10B", ... wrapping to "Grade 11A" after Z.
    pub fn class_name(index: usize) -> String {
        let letter = (b'A' + (index % 26) as u8) as char;
        format!("Grade {}{}", 10 + index / 26, letter)
    }

    /// A valid document: every class takes a random subset of at least two
    /// catalog subjects.
    pub fn document(&mut self, num_classes: usize) -> Value {
        let names: Vec<&str> = SAMPLE_SUBJECTS.iter().map(|(name, _)| *name).collect();
        let classes: Vec<Value> = (0..num_classes)
            .map(|index| {
                let count = self.rng.random_range(2..=names.len());
                let mut picked = names.clone();
                picked.shuffle(&mut self.rng);
                picked.truncate(count);
                json!({ "class": Self::class_name(index), "subjects": picked })
            })
            .collect();

        json!({
            "classes": classes,
            "subjects": SAMPLE_SUBJECTS
                .iter()
                .map(|(name, periods)| json!({ "Subject": name, "Periods": periods }))
                .collect::<Vec<_>>(),
            "teachers": SAMPLE_TEACHERS
                .iter()
                .map(|(teacher, subject)| json!({ "Teacher": teacher, "Subject": subject }))
                .collect::<Vec<_>>(),
        })
    }

    /// A document with `defect` applied; `week` sizes the over-capacity fault.
    pub fn document_with_defect(&mut self, num_classes: usize, defect: Defect, week: Week) -> Value {
        let mut doc = self.document(num_classes.max(1));
        self.inject(&mut doc, defect, week);
        doc
    }

    fn inject(&mut self, doc: &mut Value, defect: Defect, week: Week) {
        match defect {
            Defect::MissingKey => {
                let key = *["classes", "subjects", "teachers"]
                    .choose(&mut self.rng)
                    .unwrap_or(&"classes");
                if let Some(root) = doc.as_object_mut() {
                    root.remove(key);
                }
            }
            Defect::MissingField => {
                let (list, fields): (&str, [&str; 2]) = *[
                    ("classes", ["class", "subjects"]),
                    ("subjects", ["Subject", "Periods"]),
                    ("teachers", ["Teacher", "Subject"]),
                ]
                .choose(&mut self.rng)
                .unwrap_or(&("subjects", ["Subject", "Periods"]));
                let field = fields[self.rng.random_range(0..fields.len())];
                if let Some(record) = self.pick_record(doc, list) {
                    record.remove(field);
                }
            }
            Defect::WrongType => {
                if self.rng.random_bool(0.5) {
                    if let Some(record) = self.pick_record(doc, "classes") {
                        record.insert("subjects".into(), json!("Math, English, Science"));
                    }
                } else if let Some(record) = self.pick_record(doc, "subjects") {
                    record.insert("Periods".into(), json!("five"));
                }
            }
            Defect::UndefinedSubject => {
                if let Some(record) = self.pick_record(doc, "classes") {
                    if let Some(Value::Array(subjects)) = record.get_mut("subjects") {
                        subjects.push(json!("UndefinedSubject"));
                    }
                }
            }
            Defect::OverCapacity => {
                let too_many = week.slots() as u64 + 10;
                if let Some(record) = self.pick_record(doc, "subjects") {
                    record.insert("Periods".into(), json!(too_many));
                }
            }
        }
    }

    fn pick_record<'a>(
        &mut self,
        doc: &'a mut Value,
        list: &str,
    ) -> Option<&'a mut serde_json::Map<String, Value>> {
        let records = doc.get_mut(list)?.as_array_mut()?;
        if records.is_empty() {
            return None;
        }
        let index = self.rng.random_range(0..records.len());
        records[index].as_object_mut()
    }
}
