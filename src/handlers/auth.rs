// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, UserProfile},
    supabase::AuthClient,
    utils::jwt::AccessToken,
};

/// Registers a new account with the auth API.
///
/// Returns 201 Created with the profile, plus a session when the backend
/// confirms accounts automatically.
pub async fn register(
    State(auth): State<AuthClient>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.trimmed();
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let signup = auth
        .sign_up(&payload.email, &payload.password, &payload.full_name)
        .await
        .map_err(|e| {
            tracing::warn!("Failed to register user: {}", e);
            AppError::from(e)
        })?;

    tracing::info!("Registered user {}", signup.user.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": UserProfile::from(&signup.user),
            "token": signup.session.as_ref().map(|s| &s.access_token),
            "type": "Bearer",
        })),
    ))
}

/// Authenticates with email and password and returns the access token.
///
/// The token is the bearer credential for every protected route.
pub async fn login(
    State(auth): State<AuthClient>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = payload.trimmed();
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let session = auth
        .sign_in(&payload.email, &payload.password)
        .await
        .map_err(|e| {
            tracing::debug!("Login rejected: {}", e);
            match AppError::from(e) {
                AppError::BadRequest(msg) => AppError::AuthError(msg),
                other => other,
            }
        })?;

    Ok(Json(json!({
        "token": session.access_token,
        "type": "Bearer",
        "expires_in": session.expires_in,
        "refresh_token": session.refresh_token,
        "user": UserProfile::from(&session.user),
    })))
}

/// Ends the current session at the auth API.
pub async fn logout(
    State(auth): State<AuthClient>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<impl IntoResponse, AppError> {
    auth.sign_out(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the user owning the current session.
pub async fn me(
    State(auth): State<AuthClient>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth.current_user(&token).await?;
    Ok(Json(UserProfile::from(&user)))
}
