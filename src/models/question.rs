// src/models/question.rs

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html, utils::ids::id_string};

pub const QUESTIONS_TABLE: &str = "test_questions";

/// Letters used for single-choice options, in storage order.
pub const OPTION_LETTERS: [&str; 4] = ["A", "B", "C", "D"];

/// Question kind as stored in the 'question_type' column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    /// One of up to four lettered options.
    #[serde(rename = "radio", alias = "single-choice")]
    SingleChoice,
    /// Open answer graded by keyword overlap.
    #[serde(rename = "textarea", alias = "free-text")]
    FreeText,
}

/// The four labeled options of a single-choice question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSet {
    #[serde(default)]
    pub a: Option<String>,
    #[serde(default)]
    pub b: Option<String>,
    #[serde(default)]
    pub c: Option<String>,
    #[serde(default)]
    pub d: Option<String>,
}

/// Represents the 'test_questions' table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(deserialize_with = "id_string")]
    pub id: String,

    #[serde(deserialize_with = "id_string")]
    pub test_id: String,

    pub question_text: String,

    /// 1-based position, unique and dense within a test.
    pub question_order: i64,

    /// Missing on rows created before types existed; such rows are never scored.
    #[serde(default)]
    pub question_type: Option<QuestionType>,

    #[serde(default)]
    pub option_a: Option<String>,
    #[serde(default)]
    pub option_b: Option<String>,
    #[serde(default)]
    pub option_c: Option<String>,
    #[serde(default)]
    pub option_d: Option<String>,

    /// Option letter for single-choice, keyword string for free-text.
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl Question {
    pub fn options(&self) -> OptionSet {
        OptionSet {
            a: self.option_a.clone(),
            b: self.option_b.clone(),
            c: self.option_c.clone(),
            d: self.option_d.clone(),
        }
    }
}

/// DTO for sending a question to learners (excludes the correct answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub question_order: i64,
    pub question_text: String,
    pub question_type: Option<QuestionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OptionSet>,
}

impl From<Question> for PublicQuestion {
    fn from(question: Question) -> Self {
        let options = (question.question_type == Some(QuestionType::SingleChoice))
            .then(|| question.options());
        Self {
            id: question.id,
            question_order: question.question_order,
            question_text: question.question_text,
            question_type: question.question_type,
            options,
        }
    }
}

/// A question authored by an administrator.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewQuestion {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,

    pub question_type: QuestionType,

    /// Exactly four options for single-choice questions.
    #[serde(default)]
    pub options: Vec<String>,

    /// Index (0..=3) of the correct option for single-choice questions.
    #[serde(default)]
    pub correct_option: Option<usize>,

    /// Reference keywords for free-text questions.
    #[validate(length(max = 1000))]
    #[serde(default)]
    pub correct_answer: Option<String>,
}

impl NewQuestion {
    /// Checks the per-type rules and renders the row to insert.
    pub fn to_record(&self, test_id: &str, order: i64) -> Result<Value, AppError> {
        let text = self.question_text.trim();
        if text.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Question {order}: question text is required"
            )));
        }

        match self.question_type {
            QuestionType::SingleChoice => {
                if self.options.len() != OPTION_LETTERS.len()
                    || self.options.iter().any(|opt| opt.trim().is_empty())
                {
                    return Err(AppError::BadRequest(format!(
                        "Question {order}: all four options are required"
                    )));
                }
                if self.options.iter().any(|opt| opt.len() > 500) {
                    return Err(AppError::BadRequest(format!(
                        "Question {order}: option too long"
                    )));
                }
                let letter = self
                    .correct_option
                    .and_then(|idx| OPTION_LETTERS.get(idx))
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Question {order}: correct option must be selected"
                        ))
                    })?;

                Ok(json!({
                    "test_id": test_id,
                    "question_text": clean_html(text),
                    "question_type": self.question_type,
                    "question_order": order,
                    "option_a": self.options[0].trim(),
                    "option_b": self.options[1].trim(),
                    "option_c": self.options[2].trim(),
                    "option_d": self.options[3].trim(),
                    "correct_answer": letter,
                }))
            }
            QuestionType::FreeText => {
                let answer = self
                    .correct_answer
                    .as_deref()
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Question {order}: reference answer is required"
                        ))
                    })?;

                Ok(json!({
                    "test_id": test_id,
                    "question_text": clean_html(text),
                    "question_type": self.question_type,
                    "question_order": order,
                    "option_a": null,
                    "option_b": null,
                    "option_c": null,
                    "option_d": null,
                    "correct_answer": answer,
                }))
            }
        }
    }
}

/// DTO for appending structured questions to a test.
#[derive(Debug, Deserialize, Validate)]
pub struct AddQuestionsRequest {
    #[validate(length(min = 1, max = 200), nested)]
    pub questions: Vec<NewQuestion>,
}

/// DTO for appending one free-text question per line.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkQuestionsRequest {
    #[validate(length(min = 1, max = 100000))]
    pub text: String,
}

impl BulkQuestionsRequest {
    /// Non-blank trimmed lines, in input order.
    pub fn lines(&self) -> Vec<&str> {
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}
