// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use runlog::crypto::CryptoError;
use runlog::error::AppError;
use serde_json::Value;

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_client_errors_carry_details() {
    let (status, json) = render(AppError::NotFound("Session abc".to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["details"], "Session abc");

    let (status, json) = render(AppError::Conflict("synced".to_string())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    let (status, json) = render(AppError::BadRequest("bad date".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_server_errors_hide_details() {
    let (status, json) = render(AppError::StravaApi {
        status: 503,
        body: "upstream secret".to_string(),
    })
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "strava_error");
    assert!(json.get("details").is_none());

    let (status, json) = render(AppError::ConfigMissing("STRAVA_VERIFY_TOKEN")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "server_configuration");

    let (status, json) = render(AppError::Database("connection reset".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "database_error");
    assert!(json.get("details").is_none());

    let (_, json) = render(AppError::Crypto(CryptoError::Authentication)).await;
    assert_eq!(json["error"], "internal_error");
}

#[test]
fn test_credential_errors() {
    assert!(AppError::Crypto(CryptoError::Authentication).is_credential_error());
    assert!(AppError::Crypto(CryptoError::Decode).is_credential_error());
    assert!(AppError::ConfigMissing("ENCRYPTION_KEY").is_credential_error());
    assert!(AppError::StravaApi {
        status: 401,
        body: String::new()
    }
    .is_credential_error());
}

#[test]
fn test_non_credential_errors() {
    assert!(!AppError::StravaApi {
        status: 429,
        body: "Rate Limit Exceeded".to_string()
    }
    .is_credential_error());
    assert!(!AppError::StravaApi {
        status: 500,
        body: String::new()
    }
    .is_credential_error());
    assert!(!AppError::ConfigMissing("STRAVA_CLIENT_ID").is_credential_error());
    assert!(!AppError::Transport("timeout".to_string()).is_credential_error());
    assert!(!AppError::BadRequest("Bad Request".to_string()).is_credential_error());
}
