// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::AppError,
    models::user::{AppMetadata, UserMetadata},
};

/// Claims of an access token issued by the auth API.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the user id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub aud: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
    /// Written only by the backend, so safe to read the role from.
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.app_metadata.role.as_deref() == Some("admin")
    }
}

/// The raw bearer token of the current request, for calls made on the user's behalf.
#[derive(Debug, Clone)]
pub struct AccessToken(pub String);

/// Signs a token with the same shape the auth API issues.
///
/// Production tokens always come from the auth API. This exists so tests and
/// local tooling can mint tokens against a known secret.
///
/// Arguments:
/// * `user_id`: subject.
/// * `role`: value of `app_metadata.role`, `None` for learners.
pub fn sign_jwt(
    user_id: &str,
    email: &str,
    role: Option<&str>,
    secret: &str,
    audience: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_owned(),
        email: Some(email.to_owned()),
        aud: audience.to_owned(),
        exp: expiration,
        app_metadata: AppMetadata {
            role: role.map(str::to_owned),
        },
        user_metadata: UserMetadata::default(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies signature, expiry and audience of a token.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str, audience: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `Claims` and the raw `AccessToken` into the request extensions.
/// If invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token.to_owned(),
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    match verify_jwt(&token, &config.jwt_secret, &config.jwt_audience) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            req.extensions_mut().insert(AccessToken(token));
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks the verified `app_metadata.role`.
/// If it is not 'admin', returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trip_keeps_role() {
        let token = sign_jwt("u1", "a@b.uz", Some("admin"), SECRET, "authenticated", 60).unwrap();

        let claims = verify_jwt(&token, SECRET, "authenticated").unwrap();

        assert_eq!(claims.sub, "u1");
        assert!(claims.is_admin());
    }

    #[test]
    fn learner_is_not_admin() {
        let token = sign_jwt("u1", "a@b.uz", None, SECRET, "authenticated", 60).unwrap();
        assert!(!verify_jwt(&token, SECRET, "authenticated").unwrap().is_admin());
    }

    #[test]
    fn rejects_wrong_secret_and_audience() {
        let token = sign_jwt("u1", "a@b.uz", None, SECRET, "authenticated", 60).unwrap();

        assert!(verify_jwt(&token, "other-secret", "authenticated").is_err());
        assert!(verify_jwt(&token, SECRET, "service").is_err());
    }
}
