//! Exam catalog records.

#[cfg(test)]
#[path = "exams_test.rs"]
mod exams_test;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::net::types::deserialize_opt_string_lenient;

/// Public read path; writes go to [`EXAMS_WRITE_PATH`].
pub const EXAMS_PATH: &str = "/exams";
pub const EXAMS_WRITE_PATH: &str = "/admin/exams";

/// `GET /exams` reply.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamList {
    #[serde(default)]
    pub exams: Vec<Exam>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    /// Mongo `_id`. A stray `id` key is left in `extra`.
    #[serde(
        default,
        rename = "_id",
        deserialize_with = "deserialize_opt_string_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub features: Vec<String>,
    /// Category name to its sub-categories, kept as sent.
    #[serde(default)]
    pub categories: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Exam {
    fn matches(&self, needle: &str, raw: &str) -> bool {
        [&self.name, &self.description, &self.duration]
            .into_iter()
            .any(|field| field.to_lowercase().contains(needle))
            || self.features.iter().any(|f| f.to_lowercase().contains(needle))
            || self.price.to_string().contains(raw)
    }
}

/// Split a comma-separated feature list, dropping blanks.
#[must_use]
pub fn parse_features(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Search over name, description, features, duration and price.
#[must_use]
pub fn filter_exams<'a>(exams: &'a [Exam], term: &str) -> Vec<&'a Exam> {
    let raw = term.trim();
    if raw.is_empty() {
        return exams.iter().collect();
    }
    let needle = raw.to_lowercase();
    exams.iter().filter(|exam| exam.matches(&needle, raw)).collect()
}

/// Name of the exam with `id`, if listed.
#[must_use]
pub fn exam_name<'a>(exams: &'a [Exam], id: &str) -> Option<&'a str> {
    exams
        .iter()
        .find(|exam| exam.id.as_deref() == Some(id))
        .map(|exam| exam.name.as_str())
}
