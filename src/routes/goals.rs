// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Goal routes. Progress is computed on read from the sessions in range.

use crate::error::{AppError, Result};
use crate::models::{CreateGoalRequest, Goal, GoalProgress};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/goals", get(list_goals).post(create_goal))
        .route("/api/goals/{id}", get(get_goal).delete(delete_goal))
}

async fn progress_for(state: &AppState, goal: Goal) -> Result<GoalProgress> {
    let sessions = state
        .store
        .list_sessions(goal.start_date, goal.end_date)
        .await?;
    Ok(GoalProgress::compute(goal, sessions, Utc::now()))
}

async fn create_goal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<Goal>)> {
    req.validate()?;
    let goal = state.store.create_goal(&req).await?;
    tracing::info!(goal_id = %goal.id, target_km = goal.target_distance, "Created goal");
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn list_goals(State(state): State<Arc<AppState>>) -> Result<Json<Vec<GoalProgress>>> {
    let goals = state.store.list_goals().await?;
    let mut progress = Vec::with_capacity(goals.len());
    for goal in goals {
        progress.push(progress_for(&state, goal).await?);
    }
    Ok(Json(progress))
}

async fn get_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GoalProgress>> {
    let goal = state
        .store
        .get_goal(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Goal {}", id)))?;
    Ok(Json(progress_for(&state, goal).await?))
}

async fn delete_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.store.delete_goal(&id).await? {
        return Err(AppError::NotFound(format!("Goal {}", id)));
    }
    tracing::info!(goal_id = %id, "Deleted goal");
    Ok(StatusCode::NO_CONTENT)
}
