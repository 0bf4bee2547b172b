// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::{Value, json};

use crate::{
    error::AppError,
    grading::{GradedSubmission, grade_submission},
    models::{
        question::{PublicQuestion, QUESTIONS_TABLE, Question},
        result::{AnswerDetail, RESULTS_TABLE, SubmitTestRequest, SubmitTestResponse},
        test::{TESTS_TABLE, Test, TestDetail},
    },
    store::{Direction, Query, Store, StoreError},
    utils::{ids::id_value_to_string, jwt::Claims},
};

pub(crate) async fn fetch_questions(
    store: &dyn Store,
    test_id: &str,
) -> Result<Vec<Question>, AppError> {
    let rows = store
        .select(
            &Query::table(QUESTIONS_TABLE)
                .eq("test_id", test_id)
                .order_by("question_order", Direction::Asc),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions of test {}: {}", test_id, e);
            AppError::from(e)
        })?;

    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(AppError::from))
        .collect()
}

/// Lists all tests.
pub async fn list_tests(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    let rows = store
        .select(&Query::table(TESTS_TABLE).select("id, title, description"))
        .await
        .map_err(|e| {
            tracing::error!("Failed to list tests: {}", e);
            AppError::from(e)
        })?;

    let tests = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Test>, _>>()?;

    Ok(Json(tests))
}

/// Returns a test with its ordered questions. Correct answers are hidden.
pub async fn get_test(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let test: Test = match store
        .select_single(&Query::table(TESTS_TABLE).eq("id", &id))
        .await
    {
        Ok(row) => serde_json::from_value(row)?,
        Err(StoreError::RowNotFound) => {
            return Err(AppError::NotFound("Test not found".to_string()));
        }
        Err(e) => {
            tracing::error!("Failed to fetch test {}: {}", id, e);
            return Err(e.into());
        }
    };

    let questions = fetch_questions(store.as_ref(), &id)
        .await?
        .into_iter()
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(TestDetail { test, questions }))
}

/// Grades an attempt and stores the result.
///
/// * Single-choice answers must equal the stored option letter.
/// * Free-text answers need one keyword in common with the reference.
/// * Blank answers are not graded.
pub async fn submit_test(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(req): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let questions = fetch_questions(store.as_ref(), &id).await?;
    if questions.is_empty() {
        return Err(AppError::NotFound("Test has no questions".to_string()));
    }

    let GradedSubmission {
        score,
        total_questions,
        details,
    } = grade_submission(&questions, &req.answers);

    let record = json!({
        "user_id": claims.sub,
        "test_id": id,
        "total_questions": total_questions,
        "score": score,
    });

    let result_id = insert_result(store.as_ref(), record, &details).await?;

    tracing::info!(
        "User {} scored {}/{} on test {}",
        claims.sub,
        score,
        total_questions,
        id
    );

    Ok(Json(SubmitTestResponse {
        result_id,
        score,
        total_questions,
        answers: details,
    }))
}

/// Stores the result together with its answer details. Stores that lack an
/// `answers` column get the bare result.
async fn insert_result(
    store: &dyn Store,
    mut record: Value,
    details: &[AnswerDetail],
) -> Result<Option<String>, AppError> {
    let bare = record.clone();
    record["answers"] = serde_json::to_value(details)?;

    let inserted = match store.insert(RESULTS_TABLE, record, "id").await {
        Ok(rows) => rows,
        Err(e) if e.is_undefined_column() => {
            tracing::warn!("Result table has no answers column, storing score only");
            store.insert(RESULTS_TABLE, bare, "id").await.map_err(|e| {
                tracing::error!("Failed to store result: {}", e);
                AppError::from(e)
            })?
        }
        Err(e) => {
            tracing::error!("Failed to store result: {}", e);
            return Err(e.into());
        }
    };

    Ok(inserted
        .first()
        .and_then(|row| row.get("id"))
        .and_then(id_value_to_string))
}
