// src/models/result.rs

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{models::question::OptionSet, utils::ids::id_string};

pub const RESULTS_TABLE: &str = "test_results";

/// Per-question record of an attempt.
///
/// Decoding is lenient because rows may come from tables whose exact shape is
/// not known in advance. Every field may be missing, null or of an unexpected
/// type; such values are coerced or left empty, so a record is never rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerDetail {
    #[serde(default, deserialize_with = "loose_number")]
    pub question_number: Option<i64>,
    #[serde(default, deserialize_with = "loose_text")]
    pub question_text: Option<String>,
    /// Raw type tag ('radio' or 'textarea').
    #[serde(default, deserialize_with = "loose_text")]
    pub question_type: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub user_answer: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub correct_answer: Option<String>,
    /// Derived from the answers above, never authoritative.
    #[serde(default, deserialize_with = "loose_flag")]
    pub is_correct: bool,
    #[serde(
        default,
        deserialize_with = "loose_options",
        skip_serializing_if = "Option::is_none"
    )]
    pub options: Option<OptionSet>,
}

impl AnswerDetail {
    /// Decodes any stored value. Non-objects become an empty record.
    pub fn from_stored(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

fn loose_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(deserializer)?))
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn loose_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "t" | "1" | "yes"
        ),
        _ => false,
    })
}

/// Options stored either as `{a, b, c, d}` or as a list in letter order.
fn loose_options<'de, D>(deserializer: D) -> Result<Option<OptionSet>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(mut fields) => {
            let mut take = |key: &str| {
                fields
                    .remove(key)
                    .or_else(|| fields.remove(&key.to_uppercase()))
                    .and_then(text_of)
            };
            Some(OptionSet {
                a: take("a"),
                b: take("b"),
                c: take("c"),
                d: take("d"),
            })
        }
        Value::Array(items) => {
            let mut items = items.into_iter().map(text_of);
            Some(OptionSet {
                a: items.next().flatten(),
                b: items.next().flatten(),
                c: items.next().flatten(),
                d: items.next().flatten(),
            })
        }
        _ => None,
    })
}

/// Title of the test joined through the `tests(title)` relation.
#[derive(Debug, Deserialize)]
pub struct TestTitle {
    pub title: Option<String>,
}

/// A 'test_results' row as read for the learner dashboard.
#[derive(Debug, Deserialize)]
pub struct ResultRow {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub test_id: String,
    #[serde(default)]
    pub tests: Option<TestTitle>,
    #[serde(default)]
    pub answered_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub total_questions: i64,
    #[serde(default)]
    pub score: i64,
}

/// One line of the learner dashboard.
#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub id: String,
    pub test_id: String,
    pub test_title: String,
    pub answered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_questions: i64,
    pub score: i64,
    pub mistakes: i64,
}

impl From<ResultRow> for ResultSummary {
    fn from(row: ResultRow) -> Self {
        let test_title = row
            .tests
            .and_then(|t| t.title)
            .unwrap_or_else(|| "Unknown test".to_string());
        Self {
            id: row.id,
            test_id: row.test_id,
            test_title,
            answered_at: row.answered_at,
            total_questions: row.total_questions,
            score: row.score,
            mistakes: row.total_questions - row.score,
        }
    }
}

/// Owner lookup used before revealing a result's answers.
#[derive(Debug, Deserialize)]
pub struct ResultOwner {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitTestRequest {
    /// Key: question id. Value: option letter or free text.
    pub answers: HashMap<String, String>,
}

/// Outcome of a submitted attempt.
#[derive(Debug, Serialize)]
pub struct SubmitTestResponse {
    pub result_id: Option<String>,
    pub score: i64,
    pub total_questions: i64,
    pub answers: Vec<AnswerDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answer_detail_tolerates_nulls_and_missing_fields() {
        let detail: AnswerDetail = serde_json::from_value(json!({
            "question_number": 2,
            "user_answer": null,
            "is_correct": null,
            "extra_column": "ignored"
        }))
        .unwrap();

        assert_eq!(detail.question_number, Some(2));
        assert_eq!(detail.user_answer, None);
        assert!(!detail.is_correct);
    }

    #[test]
    fn answer_detail_coerces_mismatched_field_types() {
        let detail: AnswerDetail = serde_json::from_value(json!({
            "question_number": "4",
            "user_answer": 1370,
            "is_correct": 1,
            "options": ["Toshkent", "Xiva", null, "Termiz"]
        }))
        .unwrap();

        assert_eq!(detail.question_number, Some(4));
        assert_eq!(detail.user_answer.as_deref(), Some("1370"));
        assert!(detail.is_correct);
        let options = detail.options.unwrap();
        assert_eq!(options.b.as_deref(), Some("Xiva"));
        assert_eq!(options.c, None);

        let float_number: AnswerDetail =
            serde_json::from_value(json!({ "question_number": 2.0, "is_correct": "false" }))
                .unwrap();
        assert_eq!(float_number.question_number, Some(2));
        assert!(!float_number.is_correct);
    }

    #[test]
    fn non_object_record_becomes_empty_detail() {
        assert_eq!(AnswerDetail::from_stored(json!(7)), AnswerDetail::default());
    }

    #[test]
    fn summary_counts_mistakes_and_defaults_title() {
        let row: ResultRow = serde_json::from_value(json!({
            "id": 7,
            "test_id": "t1",
            "tests": null,
            "answered_at": "2025-03-01T10:15:00+00:00",
            "total_questions": 10,
            "score": 7
        }))
        .unwrap();

        let summary = ResultSummary::from(row);
        assert_eq!(summary.id, "7");
        assert_eq!(summary.test_title, "Unknown test");
        assert_eq!(summary.mistakes, 3);
        assert!(summary.answered_at.is_some());
    }
}
