// src/supabase/auth.rs

use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::user::AuthUser;

/// Errors reported by the auth API.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong credentials, expired or revoked session.
    #[error("{0}")]
    Unauthorized(String),

    /// The request was refused (e.g. weak password, email already registered).
    #[error("{0}")]
    Rejected(String),

    #[error("auth service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed auth response: {0}")]
    Decode(String),
}

/// Error bodies vary between endpoints; any of these may carry the message.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .or(self.error)
    }
}

/// A signed-in session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing)]
    pub user: AuthUser,
}

fn bearer() -> String {
    "bearer".to_string()
}

/// Result of a sign-up. The session is absent while email confirmation is pending.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<Session>,
}

/// Client of the hosted auth API (`/auth/v1`).
#[derive(Clone)]
pub struct AuthClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AuthClient {
    pub fn new(base_url: &str, api_key: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/auth/v1/{}", self.base_url, endpoint))
            .header("apikey", &self.api_key)
    }

    async fn send(request: RequestBuilder) -> Result<Response, AuthError> {
        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(body);

        Err(match status {
            401 | 403 => AuthError::Unauthorized(message),
            400 | 422 | 429 => AuthError::Rejected(message),
            _ => AuthError::Service { status, message },
        })
    }

    /// Registers an account with email, password and display name.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUp, AuthError> {
        let response = Self::send(self.request(Method::POST, "signup").json(&json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        })))
        .await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        // With auto-confirm the API answers with a session, otherwise with the bare user.
        if body.get("access_token").is_some() {
            let session: Session =
                serde_json::from_value(body).map_err(|e| AuthError::Decode(e.to_string()))?;
            return Ok(SignUp {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: AuthUser =
            serde_json::from_value(user_value).map_err(|e| AuthError::Decode(e.to_string()))?;
        Ok(SignUp {
            user,
            session: None,
        })
    }

    /// Exchanges email and password for a session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let response = Self::send(
            self.request(Method::POST, "token?grant_type=password")
                .json(&json!({ "email": email, "password": password })),
        )
        .await?;

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))
    }

    /// Revokes the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        Self::send(self.request(Method::POST, "logout").bearer_auth(access_token)).await?;
        Ok(())
    }

    /// Looks up the user owning `access_token`.
    pub async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response =
            Self::send(self.request(Method::GET, "user").bearer_auth(access_token)).await?;

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AuthClient {
        AuthClient::new(&server.uri(), "anon-key", reqwest::Client::new())
    }

    fn user_json() -> Value {
        json!({
            "id": "0b6c",
            "email": "aziz@maktab.uz",
            "app_metadata": {"provider": "email"},
            "user_metadata": {"full_name": "Aziz"}
        })
    }

    #[tokio::test]
    async fn sign_in_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({"email": "aziz@maktab.uz", "password": "secret1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "r",
                "user": user_json()
            })))
            .mount(&server)
            .await;

        let session = client(&server).sign_in("aziz@maktab.uz", "secret1").await.unwrap();

        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.user.user_metadata.full_name.as_deref(), Some("Aziz"));
        assert_eq!(session.user.app_metadata.role, None);
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server).sign_in("x@y.uz", "nope").await.unwrap_err();

        match err {
            AuthError::Rejected(message) => assert_eq!(message, "Invalid login credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sign_up_without_session_while_confirmation_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(body_json(json!({
                "email": "aziz@maktab.uz",
                "password": "secret1",
                "data": {"full_name": "Aziz"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .mount(&server)
            .await;

        let signup = client(&server)
            .sign_up("aziz@maktab.uz", "secret1", "Aziz")
            .await
            .unwrap();

        assert_eq!(signup.user.id, "0b6c");
        assert!(signup.session.is_none());
    }

    #[tokio::test]
    async fn current_user_and_sign_out_send_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let auth = client(&server);
        let user = auth.current_user("user-token").await.unwrap();
        auth.sign_out("user-token").await.unwrap();

        assert_eq!(user.email.as_deref(), Some("aziz@maktab.uz"));
    }

    #[tokio::test]
    async fn expired_session_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"code": 401, "msg": "JWT expired"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).current_user("old").await.unwrap_err();

        assert!(matches!(err, AuthError::Unauthorized(ref m) if m == "JWT expired"));
    }
}
