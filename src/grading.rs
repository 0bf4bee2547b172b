// src/grading.rs

use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;

use crate::models::{
    question::{Question, QuestionType},
    result::AnswerDetail,
};

static KEYWORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("static regex is valid"));

/// Lower-cases `text` and splits it on runs of commas and whitespace.
/// Empty tokens are dropped, duplicates kept.
pub fn extract_keywords(text: &str) -> Vec<String> {
    KEYWORD_SEPARATOR
        .split(&text.to_lowercase())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// A free-text answer counts as correct when it shares at least one keyword
/// with the reference answer. Matching is exact per token.
pub fn check_free_text_answer(user_answer: &str, reference_answer: &str) -> bool {
    let reference = extract_keywords(reference_answer);
    extract_keywords(user_answer)
        .iter()
        .any(|keyword| reference.contains(keyword))
}

/// Score of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedSubmission {
    pub score: i64,
    pub total_questions: i64,
    pub details: Vec<AnswerDetail>,
}

/// Grades every question of a test against the submitted answers.
///
/// `answers` is keyed by question id. Blank answers are left ungraded and
/// count as wrong. Questions without a known type are never scored.
pub fn grade_submission(questions: &[Question], answers: &HashMap<String, String>) -> GradedSubmission {
    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by_key(|q| q.question_order);

    let mut score = 0;
    let details = ordered
        .into_iter()
        .map(|question| {
            let user_answer = answers
                .get(&question.id)
                .map(|a| a.trim())
                .unwrap_or_default();
            let reference = question.correct_answer.as_deref().unwrap_or_default();

            let is_correct = !user_answer.is_empty()
                && match question.question_type {
                    Some(QuestionType::SingleChoice) => user_answer == reference,
                    Some(QuestionType::FreeText) => check_free_text_answer(user_answer, reference),
                    None => false,
                };

            if is_correct {
                score += 1;
            }

            AnswerDetail {
                question_number: Some(question.question_order),
                question_text: Some(question.question_text.clone()),
                question_type: question
                    .question_type
                    .map(|t| type_tag(t).to_string()),
                user_answer: Some(user_answer.to_string()),
                correct_answer: question.correct_answer.clone(),
                is_correct,
                options: (question.question_type == Some(QuestionType::SingleChoice))
                    .then(|| question.options()),
            }
        })
        .collect();

    GradedSubmission {
        score,
        total_questions: questions.len() as i64,
        details,
    }
}

fn type_tag(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::SingleChoice => "radio",
        QuestionType::FreeText => "textarea",
    }
}
