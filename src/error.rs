// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::crypto::CryptoError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
///
/// Remote, credential and storage failures render as a generic 500; their
/// detail only goes to the logs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing required configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Strava API error: HTTP {status}: {body}")]
    StravaApi { status: u16, body: String },

    #[error("Strava request failed: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the stored connection can no longer be used and the athlete
    /// has to reconnect (bad key, corrupt ciphertext, revoked grant).
    pub fn is_credential_error(&self) -> bool {
        match self {
            AppError::Crypto(_) => true,
            AppError::ConfigMissing(name) => *name == "ENCRYPTION_KEY",
            AppError::StravaApi { status, .. } => *status == 401,
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                Some(errors.to_string()),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::ConfigMissing(name) => {
                tracing::error!(setting = name, "Server configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, "server_configuration", None)
            }
            AppError::StravaApi { status, body } => {
                tracing::error!(status, body = %body, "Strava API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "strava_error", None)
            }
            AppError::Transport(msg) | AppError::Decode(msg) => {
                tracing::error!(error = %msg, "Strava request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "strava_error", None)
            }
            AppError::Crypto(err) => {
                tracing::error!(error = %err, "Credential error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
