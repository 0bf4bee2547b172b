// src/config.rs

use std::env;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Project url of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub supabase_url: String,
    /// API key sent to both the REST store and the auth API.
    pub supabase_key: String,
    /// Secret the auth API signs access tokens with.
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub rust_log: String,
    pub port: u16,
    pub http_timeout_secs: u64,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let supabase_url = required("SUPABASE_URL")?;
        let supabase_key = required("SUPABASE_KEY")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_audience = lookup("JWT_AUDIENCE").unwrap_or_else(|| "authenticated".to_string());

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let port = match lookup("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => 3000,
        };

        let http_timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                value,
            })?,
            None => 10,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Ok(Self {
            supabase_url,
            supabase_key,
            jwt_secret,
            jwt_audience,
            rust_log,
            port,
            http_timeout_secs,
            cors_origins,
        })
    }
}
