// src/stats.rs

//! Per-student aggregation over stored results.

use std::collections::BTreeMap;

use crate::models::stats::{StatRow, StudentStat};

const UNKNOWN_EMAIL: &str = "Unknown";
const UNKNOWN_NAME: &str = "Noma'lum";

/// Groups result rows by learner and sums their scores.
///
/// Output is ordered by user id. Missing scores count as zero.
pub fn aggregate_student_stats(rows: &[StatRow]) -> Vec<StudentStat> {
    let mut by_user: BTreeMap<&str, StudentStat> = BTreeMap::new();

    for row in rows {
        let stat = by_user.entry(&row.user_id).or_insert_with(|| {
            let profile = row.users.clone().unwrap_or_default();
            StudentStat {
                user_id: row.user_id.clone(),
                user_email: or_label(profile.email, UNKNOWN_EMAIL),
                user_name: or_label(profile.full_name, UNKNOWN_NAME),
                total_tests_taken: 0,
                total_correct: 0,
                total_questions: 0,
                average_score: 0,
            }
        });

        stat.total_tests_taken += 1;
        stat.total_correct += row.score.unwrap_or(0);
        stat.total_questions += row.total_questions.unwrap_or(0);
    }

    by_user
        .into_values()
        .map(|mut stat| {
            stat.average_score = average_percentage(stat.total_correct, stat.total_questions);
            stat
        })
        .collect()
}

/// Missing and empty values both fall back to `label`.
fn or_label(value: Option<String>, label: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| label.to_string())
}

fn average_percentage(correct: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as i64
}

/// Keeps the stats whose name or email contains `term`, ignoring case.
pub fn filter_stats(stats: Vec<StudentStat>, term: &str) -> Vec<StudentStat> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return stats;
    }

    stats
        .into_iter()
        .filter(|stat| {
            stat.user_name.to_lowercase().contains(&term)
                || stat.user_email.to_lowercase().contains(&term)
        })
        .collect()
}
