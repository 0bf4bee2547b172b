// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::{AddQuestionsRequest, BulkQuestionsRequest, NewQuestion, QUESTIONS_TABLE, QuestionType},
        result::RESULTS_TABLE,
        stats::{StatRow, StatsParams},
        test::{CreateTestRequest, TESTS_TABLE, Test},
    },
    stats::{aggregate_student_stats, filter_stats},
    store::{Direction, Query, Store, StoreError},
    utils::{html::clean_html, ids::id_value_to_string},
};

/// Lists all tests, newest first.
/// Admin only.
pub async fn list_tests(
    State(store): State<Arc<dyn Store>>,
) -> Result<impl IntoResponse, AppError> {
    let rows = store
        .select(
            &Query::table(TESTS_TABLE)
                .select("id, title, description, created_at")
                .order_by("created_at", Direction::Desc),
        )
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

/// Creates a test, optionally together with its questions.
/// Admin only.
///
/// Questions are numbered 1..N in request order. If they cannot be stored,
/// the freshly created test is removed again.
pub async fn create_test(
    State(store): State<Arc<dyn Store>>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Test title is required".to_string()));
    }
    let description = payload
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(clean_html);

    // Reject bad questions before anything is written.
    for (question, order) in payload.questions.iter().zip(1..) {
        question.to_record("", order)?;
    }

    let inserted = store
        .insert(
            TESTS_TABLE,
            json!([{ "title": clean_html(title), "description": description }]),
            "id",
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to create test: {}", e);
            AppError::from(e)
        })?;

    let test_id = inserted
        .first()
        .and_then(|row| row.get("id"))
        .and_then(id_value_to_string)
        .ok_or_else(|| AppError::InternalServerError("Store returned no test id".to_string()))?;

    if !payload.questions.is_empty() {
        if let Err(e) = insert_questions(store.as_ref(), &test_id, &payload.questions, 1).await {
            tracing::warn!("Rolling back test {} after failed question insert", test_id);
            if let Err(cleanup) = store.delete(&Query::table(TESTS_TABLE).eq("id", &test_id)).await {
                tracing::error!("Failed to remove test {}: {}", test_id, cleanup);
            }
            return Err(e);
        }
    }

    tracing::info!(
        "Created test {} with {} questions",
        test_id,
        payload.questions.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": test_id, "questions": payload.questions.len() })),
    ))
}

/// Deletes a test by ID.
/// Admin only. Dependent questions and results are the store's concern.
pub async fn delete_test(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let removed = store
        .delete(&Query::table(TESTS_TABLE).eq("id", &id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete test: {}", e);
            AppError::from(e)
        })?;

    if removed == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Appends structured questions to an existing test.
/// Admin only.
pub async fn add_questions(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<String>,
    Json(payload): Json<AddQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    ensure_test_exists(store.as_ref(), &id).await?;
    let first_order = next_question_order(store.as_ref(), &id).await?;
    insert_questions(store.as_ref(), &id, &payload.questions, first_order).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "added": payload.questions.len() })),
    ))
}

/// Appends one free-text question per non-blank line.
/// Admin only.
pub async fn add_questions_bulk(
    State(store): State<Arc<dyn Store>>,
    Path(id): Path<String>,
    Json(payload): Json<BulkQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let lines = payload.lines();
    if lines.is_empty() {
        return Err(AppError::BadRequest("No questions entered".to_string()));
    }

    ensure_test_exists(store.as_ref(), &id).await?;
    let first_order = next_question_order(store.as_ref(), &id).await?;

    let records: Vec<Value> = lines
        .iter()
        .zip(first_order..)
        .map(|(text, order)| {
            json!({
                "test_id": id,
                "question_text": clean_html(text),
                "question_type": QuestionType::FreeText,
                "question_order": order,
            })
        })
        .collect();

    store
        .insert(QUESTIONS_TABLE, Value::Array(records), "id")
        .await
        .map_err(|e| {
            tracing::error!("Failed to add questions to test {}: {}", id, e);
            AppError::from(e)
        })?;

    Ok((StatusCode::CREATED, Json(json!({ "added": lines.len() }))))
}

/// Aggregated per-student statistics, optionally filtered by name or email.
/// Admin only.
pub async fn student_stats(
    State(store): State<Arc<dyn Store>>,
    QueryParams(params): QueryParams<StatsParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = store
        .select(
            &Query::table(RESULTS_TABLE)
                .select("user_id, users(email, full_name), score, total_questions")
                .order_by("user_id", Direction::Asc),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch statistics: {}", e);
            AppError::from(e)
        })?;

    let rows = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<StatRow>, _>>()?;

    let stats = aggregate_student_stats(&rows);
    let stats = match params.search.as_deref() {
        Some(term) => filter_stats(stats, term),
        None => stats,
    };

    Ok(Json(stats))
}

async fn ensure_test_exists(store: &dyn Store, test_id: &str) -> Result<(), AppError> {
    match store
        .select_single(&Query::table(TESTS_TABLE).select("id").eq("id", test_id))
        .await
    {
        Ok(_) => Ok(()),
        Err(StoreError::RowNotFound) => Err(AppError::NotFound("Test not found".to_string())),
        Err(e) => {
            tracing::error!("Failed to fetch test {}: {}", test_id, e);
            Err(e.into())
        }
    }
}

/// Order index following the highest one already used by the test.
async fn next_question_order(store: &dyn Store, test_id: &str) -> Result<i64, AppError> {
    let rows = store
        .select(
            &Query::table(QUESTIONS_TABLE)
                .select("question_order")
                .eq("test_id", test_id)
                .order_by("question_order", Direction::Desc)
                .limit(1),
        )
        .await?;

    let last = rows
        .first()
        .and_then(|row| row.get("question_order"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    Ok(last + 1)
}

async fn insert_questions(
    store: &dyn Store,
    test_id: &str,
    questions: &[NewQuestion],
    first_order: i64,
) -> Result<(), AppError> {
    let records = questions
        .iter()
        .zip(first_order..)
        .map(|(question, order)| question.to_record(test_id, order))
        .collect::<Result<Vec<_>, _>>()?;

    store
        .insert(QUESTIONS_TABLE, Value::Array(records), "id")
        .await
        .map_err(|e| {
            tracing::error!("Failed to add questions to test {}: {}", test_id, e);
            AppError::from(e)
        })?;

    Ok(())
}
