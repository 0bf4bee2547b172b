// src/handlers/results.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    locator::AnswerLocator,
    models::result::{RESULTS_TABLE, ResultOwner, ResultRow, ResultSummary},
    store::{Direction, Query, Store, StoreError},
    utils::jwt::Claims,
};

/// Lists the current user's results, newest first.
pub async fn list_my_results(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = store
        .select(
            &Query::table(RESULTS_TABLE)
                .select(
                    r#"
                    id,
                    test_id,
                    tests(title),
                    answered_at,
                    total_questions,
                    score
                    "#,
                )
                .eq("user_id", &claims.sub)
                .order_by("answered_at", Direction::Desc),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch results of {}: {}", claims.sub, e);
            AppError::from(e)
        })?;

    let results = rows
        .into_iter()
        .map(|row| serde_json::from_value::<ResultRow>(row).map(ResultSummary::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(results))
}

/// Returns the per-question answers of a result.
///
/// Only the owner or an admin may see them. The lookup itself is best-effort
/// and answers with an empty list when nothing can be recovered.
pub async fn get_result_answers(
    State(store): State<Arc<dyn Store>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("Result id is required".to_string()));
    }

    let owner: ResultOwner = match store
        .select_single(&Query::table(RESULTS_TABLE).select("user_id").eq("id", &id))
        .await
    {
        Ok(row) => serde_json::from_value(row)?,
        Err(StoreError::RowNotFound) => {
            return Err(AppError::NotFound("Result not found".to_string()));
        }
        Err(e) => {
            tracing::error!("Failed to fetch result {}: {}", id, e);
            return Err(e.into());
        }
    };

    // Other users' results are reported as missing.
    if owner.user_id != claims.sub && !claims.is_admin() {
        return Err(AppError::NotFound("Result not found".to_string()));
    }

    let answers = AnswerLocator::new(store.as_ref()).locate(&id).await;

    Ok(Json(answers))
}
