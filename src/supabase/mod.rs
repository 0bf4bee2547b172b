// src/supabase/mod.rs

//! HTTP clients for the hosted backend: the REST store and the auth API.

pub mod auth;
pub mod rest;

use std::time::Duration;

pub use auth::{AuthClient, AuthError};
pub use rest::RestStore;

/// Builds the shared HTTP client used by both collaborators.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}
