// src/models/stats.rs

use serde::{Deserialize, Serialize};

use crate::utils::ids::id_string;

/// Public profile joined through the `users(email, full_name)` relation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// A 'test_results' row as read for statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct StatRow {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    #[serde(default)]
    pub users: Option<Profile>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub total_questions: Option<i64>,
}

/// Aggregated results of one learner. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStat {
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub total_tests_taken: i64,
    pub total_correct: i64,
    pub total_questions: i64,
    /// Percentage 0..=100, rounded.
    pub average_score: i64,
}

/// Query string of the statistics endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    pub search: Option<String>,
}
