// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Server-controlled metadata attached to an identity.
/// Only the backend's service role can write it, so it carries the admin role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Profile fields supplied by the user at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Identity as returned by the auth API.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Public view of the current user.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

impl From<&AuthUser> for UserProfile {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.user_metadata.full_name.clone(),
            is_admin: user.app_metadata.role.as_deref() == Some("admin"),
        }
    }
}

/// DTO for creating a new account (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Full name length must be between 1 and 100 characters."
    ))]
    pub full_name: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
}

impl RegisterRequest {
    /// Surrounding whitespace is never part of a field, the password included.
    pub fn trimmed(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
        }
    }
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl LoginRequest {
    /// Trimmed the same way as at registration.
    pub fn trimmed(self) -> Self {
        Self {
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
        }
    }
}
