// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Strava credentials, the token encryption key and the webhook secret are
//! optional at startup: the service still serves manual sessions and goals
//! without them, and every operation that needs one fails with
//! [`AppError::ConfigMissing`] instead of falling back to a default.

use crate::error::AppError;
use std::env;

const DEFAULT_STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
const DEFAULT_STRAVA_OAUTH_TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Allowed CORS origin (any origin when unset)
    pub cors_allowed_origin: Option<String>,
    /// GCP project for Firestore; the in-memory store is used when unset
    pub gcp_project_id: Option<String>,

    /// Strava OAuth client ID
    pub strava_client_id: Option<String>,
    /// Strava OAuth client secret
    pub strava_client_secret: Option<String>,
    /// Raw 32-byte key for token encryption
    pub encryption_key: Option<Vec<u8>>,
    /// Shared secret for the webhook subscription handshake
    pub webhook_verify_token: Option<String>,

    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth token endpoint
    pub strava_oauth_token_url: String,
    /// Timeout for outbound Strava calls
    pub http_timeout_secs: u64,
    /// Timeout for individual store operations
    pub store_timeout_secs: u64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            cors_allowed_origin: None,
            gcp_project_id: None,
            strava_client_id: Some("test_client_id".to_string()),
            strava_client_secret: Some("test_secret".to_string()),
            encryption_key: Some(b"test_encryption_key_32_bytes_ok!".to_vec()),
            webhook_verify_token: Some("test_verify_token".to_string()),
            strava_api_url: DEFAULT_STRAVA_API_URL.to_string(),
            strava_oauth_token_url: DEFAULT_STRAVA_OAUTH_TOKEN_URL.to_string(),
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            store_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
            gcp_project_id: optional("GCP_PROJECT_ID"),
            strava_client_id: optional("STRAVA_CLIENT_ID"),
            strava_client_secret: optional("STRAVA_CLIENT_SECRET"),
            encryption_key: optional("ENCRYPTION_KEY").map(String::into_bytes),
            webhook_verify_token: optional("STRAVA_VERIFY_TOKEN"),
            strava_api_url: optional("STRAVA_API_URL")
                .unwrap_or_else(|| DEFAULT_STRAVA_API_URL.to_string()),
            strava_oauth_token_url: optional("STRAVA_OAUTH_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_STRAVA_OAUTH_TOKEN_URL.to_string()),
            http_timeout_secs: parse_or("STRAVA_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            store_timeout_secs: parse_or("STORE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        })
    }

    /// The webhook verify token, or `ConfigMissing`.
    pub fn require_verify_token(&self) -> Result<&str, AppError> {
        self.webhook_verify_token
            .as_deref()
            .ok_or(AppError::ConfigMissing("STRAVA_VERIFY_TOKEN"))
    }
}

/// Read an env var, treating empty values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
