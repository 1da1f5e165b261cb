// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.

use crate::error::{AppError, Result};
use crate::models::WebhookEvent;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::Instrument;

/// Body Strava expects in response to an event delivery.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/webhooks/strava", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
///
/// All optional so that a missing parameter fails verification (403)
/// instead of being rejected by the extractor.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
}

/// Verification response.
#[derive(Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

fn tokens_match(received: &str, expected: &str) -> bool {
    received.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<impl IntoResponse> {
    let expected = state.config.require_verify_token()?;

    match (params.mode, params.verify_token, params.challenge) {
        (Some(mode), Some(token), Some(challenge))
            if mode == "subscribe" && tokens_match(&token, expected) =>
        {
            tracing::info!("Webhook subscription verified");
            Ok((StatusCode::OK, Json(VerifyResponse { challenge })).into_response())
        }
        (mode, _, _) => {
            tracing::warn!(mode = ?mode, "Webhook verification failed");
            Ok(StatusCode::FORBIDDEN.into_response())
        }
    }
}

/// Handle incoming webhook events (POST).
///
/// Responds immediately; the event is processed on a detached task whose
/// outcome is only logged.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse webhook event");
        AppError::BadRequest("Invalid webhook event".to_string())
    })?;

    tracing::info!(
        object_type = ?event.object_type,
        aspect_type = ?event.aspect_type,
        object_id = event.object_id,
        owner_id = event.owner_id,
        "Webhook event received"
    );

    let span = tracing::info_span!(
        "webhook_event",
        object_type = ?event.object_type,
        aspect_type = ?event.aspect_type,
        object_id = event.object_id,
        owner_id = event.owner_id,
    );
    let sync = state.sync_service.clone();
    tokio::spawn(
        async move {
            match sync.process_event(&event).await {
                Ok(outcome) => tracing::info!(?outcome, "Webhook event processed"),
                Err(e) => tracing::error!(
                    error = %e,
                    credential_error = e.is_credential_error(),
                    "Failed to process webhook event"
                ),
            }
        }
        .instrument(span),
    );

    Ok((StatusCode::OK, EVENT_RECEIVED))
}
