// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava connection routes.

use crate::error::{AppError, Result};
use crate::models::ConnectionStatus;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/strava/connect", post(connect))
        .route("/api/strava/status", get(status))
        .route("/api/strava/disconnect", delete(disconnect))
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub strava_athlete_id: u64,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
    pub message: String,
}

/// Exchange an OAuth authorization code and store the connection.
async fn connect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<ConnectResponse>)> {
    let code = req.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest(
            "Authorization code is required".to_string(),
        ));
    }

    let connection = state.strava_service.connect(code).await?;
    Ok((
        StatusCode::CREATED,
        Json(ConnectResponse {
            success: true,
            strava_athlete_id: connection.athlete_id,
            connected_at: connection.connected_at,
        }),
    ))
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<ConnectionStatus>> {
    Ok(Json(state.strava_service.status().await?))
}

async fn disconnect(State(state): State<Arc<AppState>>) -> Result<Json<DisconnectResponse>> {
    state
        .strava_service
        .disconnect()
        .await?
        .ok_or_else(|| AppError::NotFound("No Strava connection found".to_string()))?;

    Ok(Json(DisconnectResponse {
        success: true,
        message: "Strava disconnected".to_string(),
    }))
}
