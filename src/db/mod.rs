// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer.
//!
//! [`Store`] is the interface the services and routes depend on. Two backends
//! implement it: [`FirestoreDb`] for deployments and [`MemoryStore`] for local
//! runs without a GCP project and for tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Connection, CreateGoalRequest, Goal, Session, SessionFields};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    /// Strava connections (keyed by athlete_id)
    pub const CONNECTIONS: &str = "connections";
    /// Sessions (manual keyed by UUID, synced keyed by `strava-{activity_id}`)
    pub const SESSIONS: &str = "sessions";
    pub const GOALS: &str = "goals";
}

/// Document ID for the session synced from a Strava activity.
///
/// Keying synced sessions by activity ID makes the activity ID unique in the
/// sessions collection.
pub fn external_session_id(activity_id: u64) -> String {
    format!("strava-{}", activity_id)
}

#[async_trait]
pub trait Store: Send + Sync {
    // ─── Connections ─────────────────────────────────────────────

    async fn get_connection_by_athlete_id(
        &self,
        athlete_id: u64,
    ) -> Result<Option<Connection>, AppError>;

    /// Resolve the connection belonging to a local user. Single-tenant
    /// callers pass `None` and get the only connection, if any.
    async fn find_connection_for_user(
        &self,
        user_id: Option<i64>,
    ) -> Result<Option<Connection>, AppError>;

    /// Store a connection, replacing any existing one for the same athlete.
    async fn create_connection(&self, connection: &Connection) -> Result<(), AppError>;

    /// Overwrite the encrypted token pair and expiry. Fails with `NotFound`
    /// if the athlete has no connection.
    async fn update_tokens(
        &self,
        athlete_id: u64,
        access_token_encrypted: &str,
        refresh_token_encrypted: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn record_sync(&self, athlete_id: u64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Returns false if there was nothing to delete.
    async fn delete_connection(&self, athlete_id: u64) -> Result<bool, AppError>;

    // ─── Manual sessions ─────────────────────────────────────────

    async fn create_session(&self, fields: SessionFields) -> Result<Session, AppError>;

    /// Sessions with `start <= date <= end`, newest first.
    async fn list_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>, AppError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, AppError>;

    async fn update_session(
        &self,
        id: &str,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError>;

    async fn delete_session(&self, id: &str) -> Result<bool, AppError>;

    // ─── Synced sessions ─────────────────────────────────────────

    async fn get_session_by_external_id(
        &self,
        activity_id: u64,
    ) -> Result<Option<Session>, AppError>;

    /// Insert a synced session. Returns `None` if a session for the activity
    /// already exists.
    async fn create_external_session(
        &self,
        activity_id: u64,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError>;

    /// Update date, distance, duration and notes of a synced session.
    async fn update_external_session(
        &self,
        activity_id: u64,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError>;

    async fn delete_session_by_external_id(&self, activity_id: u64) -> Result<bool, AppError>;

    // ─── Goals ───────────────────────────────────────────────────

    async fn create_goal(&self, req: &CreateGoalRequest) -> Result<Goal, AppError>;

    /// All goals, newest first.
    async fn list_goals(&self) -> Result<Vec<Goal>, AppError>;

    async fn get_goal(&self, id: &str) -> Result<Option<Goal>, AppError>;

    async fn delete_goal(&self, id: &str) -> Result<bool, AppError>;
}
