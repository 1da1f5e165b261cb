// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training session routes.
//!
//! Sessions synced from Strava are read-only here; they change only through
//! webhook events.

use crate::error::{AppError, Result};
use crate::models::{Session, SessionRequest};
use crate::time_utils::parse_query_date;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Months, NaiveTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/{id}",
            get(get_session).put(update_session).delete(delete_session),
        )
}

/// Date range filter, `YYYY-MM-DD`.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Resolve the query into an inclusive UTC range. Defaults to the last month
/// up to `now`; an explicit end date covers that whole day.
fn resolve_range(
    query: &SessionQuery,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = match query.start_date.as_deref() {
        Some(s) => parse_query_date(s)
            .map_err(|_| AppError::BadRequest("Invalid start_date format, use YYYY-MM-DD".into()))?
            .and_time(NaiveTime::MIN)
            .and_utc(),
        None => now.checked_sub_months(Months::new(1)).unwrap_or(now),
    };

    let end = match query.end_date.as_deref() {
        Some(s) => {
            let day = parse_query_date(s).map_err(|_| {
                AppError::BadRequest("Invalid end_date format, use YYYY-MM-DD".into())
            })?;
            day.and_hms_nano_opt(23, 59, 59, 999_999_999)
                .ok_or_else(|| AppError::BadRequest("Invalid end_date".into()))?
                .and_utc()
        }
        None => now,
    };

    if end < start {
        return Err(AppError::BadRequest(
            "end_date must not be before start_date".into(),
        ));
    }
    Ok((start, end))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Vec<Session>>> {
    let (start, end) = resolve_range(&query, Utc::now())?;
    let sessions = state.store.list_sessions(start, end).await?;
    tracing::debug!(count = sessions.len(), %start, %end, "Listed sessions");
    Ok(Json(sessions))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> Result<(StatusCode, Json<Session>)> {
    req.validate()?;
    let session = state.store.create_session(req.into()).await?;
    tracing::info!(session_id = %session.id, distance_km = session.distance, "Created session");
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>> {
    state
        .store
        .get_session(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))
}

/// Load a session that the API is allowed to modify.
async fn editable_session(state: &AppState, id: &str) -> Result<Session> {
    let session = state
        .store
        .get_session(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))?;

    if session.is_synced() {
        return Err(AppError::Conflict(
            "Session is synced from Strava and cannot be modified".to_string(),
        ));
    }
    Ok(session)
}

async fn update_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SessionRequest>,
) -> Result<Json<Session>> {
    req.validate()?;
    editable_session(&state, &id).await?;

    let session = state
        .store
        .update_session(&id, req.into())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {}", id)))?;
    tracing::info!(session_id = %id, "Updated session");
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    editable_session(&state, &id).await?;

    if !state.store.delete_session(&id).await? {
        return Err(AppError::NotFound(format!("Session {}", id)));
    }
    tracing::info!(session_id = %id, "Deleted session");
    Ok(StatusCode::NO_CONTENT)
}
