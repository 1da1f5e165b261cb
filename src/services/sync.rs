// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook-driven activity sync.
//!
//! Reconciles local sessions with Strava activities:
//! 1. Look up the owner's connection (untracked athletes are skipped)
//! 2. Fetch the activity with a valid token
//! 3. Create, update or delete the matching session
//!
//! Deliveries are at-least-once and unordered. Creates are idempotent through
//! the existence check plus the unique insert, and an update for an unknown
//! session falls back to a create.

use crate::db::Store;
use crate::error::Result;
use crate::models::{AspectType, ObjectType, SessionFields, WebhookEvent};
use crate::services::strava::StravaActivity;
use crate::services::StravaService;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// The only activity type synced into sessions.
const RUN_ACTIVITY_TYPE: &str = "Run";

/// Result of handling one webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Deleted,
    /// The athlete's connection was removed
    Disconnected,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No connection for the owner
    UntrackedAthlete,
    NotARun,
    /// A session for the activity already exists
    AlreadySynced,
    /// Delete for an activity with no session
    NoSession,
    /// Event type the sync engine does not act on
    Ignored,
}

/// Applies webhook events to the session store.
#[derive(Clone)]
pub struct ActivitySync {
    strava: StravaService,
    store: Arc<dyn Store>,
}

impl ActivitySync {
    pub fn new(strava: StravaService, store: Arc<dyn Store>) -> Self {
        Self { strava, store }
    }

    /// Dispatch a webhook event to the matching handler.
    pub async fn process_event(&self, event: &WebhookEvent) -> Result<SyncOutcome> {
        match (event.object_type, event.aspect_type) {
            (ObjectType::Athlete, AspectType::Update)
                if event.update_str("authorized") == Some("false") =>
            {
                self.handle_athlete_deauthorized(event.owner_id).await
            }
            (ObjectType::Athlete, _) => Ok(SyncOutcome::Skipped(SkipReason::Ignored)),
            (ObjectType::Activity, AspectType::Create) => {
                self.handle_activity_created(event.object_id, event.owner_id)
                    .await
            }
            (ObjectType::Activity, AspectType::Update) => {
                self.handle_activity_updated(event.object_id, event.owner_id, &event.updates)
                    .await
            }
            (ObjectType::Activity, AspectType::Delete) => {
                self.handle_activity_deleted(event.object_id).await
            }
            (object_type, aspect_type) => {
                tracing::info!(?object_type, ?aspect_type, "Ignoring unknown webhook event");
                Ok(SyncOutcome::Skipped(SkipReason::Ignored))
            }
        }
    }

    /// Import a newly created activity.
    pub async fn handle_activity_created(
        &self,
        activity_id: u64,
        owner_id: u64,
    ) -> Result<SyncOutcome> {
        let Some(conn) = self.store.get_connection_by_athlete_id(owner_id).await? else {
            tracing::debug!(owner_id, activity_id, "No connection for athlete, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::UntrackedAthlete));
        };

        let activity = self.strava.fetch_activity(&conn, activity_id).await?;
        if activity.activity_type != RUN_ACTIVITY_TYPE {
            tracing::debug!(
                activity_id,
                activity_type = %activity.activity_type,
                "Skipping non-running activity"
            );
            return Ok(SyncOutcome::Skipped(SkipReason::NotARun));
        }

        let outcome = self.import_activity(activity_id, &activity).await?;
        if outcome == SyncOutcome::Created {
            self.mark_synced(owner_id).await;
        }
        Ok(outcome)
    }

    /// Re-sync an updated activity.
    ///
    /// Activities that stop being runs or become private are removed; updates
    /// for activities without a session are imported.
    pub async fn handle_activity_updated(
        &self,
        activity_id: u64,
        owner_id: u64,
        updates: &HashMap<String, serde_json::Value>,
    ) -> Result<SyncOutcome> {
        let Some(conn) = self.store.get_connection_by_athlete_id(owner_id).await? else {
            tracing::debug!(owner_id, activity_id, "No connection for athlete, skipping");
            return Ok(SyncOutcome::Skipped(SkipReason::UntrackedAthlete));
        };

        let activity = self.strava.fetch_activity(&conn, activity_id).await?;

        if activity.activity_type != RUN_ACTIVITY_TYPE {
            tracing::info!(
                activity_id,
                activity_type = %activity.activity_type,
                "Activity is no longer a run, removing session"
            );
            return self.handle_activity_deleted(activity_id).await;
        }

        if updates.get("private").and_then(|v| v.as_str()) == Some("true") {
            tracing::info!(activity_id, "Activity became private, removing session");
            return self.handle_activity_deleted(activity_id).await;
        }

        let outcome = if self
            .store
            .get_session_by_external_id(activity_id)
            .await?
            .is_none()
        {
            tracing::info!(activity_id, "No session for updated activity, importing");
            self.import_activity(activity_id, &activity).await?
        } else {
            self.store
                .update_external_session(activity_id, session_fields(&activity))
                .await?;
            tracing::info!(activity_id, "Updated session from Strava");
            SyncOutcome::Updated
        };

        if matches!(outcome, SyncOutcome::Created | SyncOutcome::Updated) {
            self.mark_synced(owner_id).await;
        }
        Ok(outcome)
    }

    /// Remove the session for a deleted activity, if any.
    pub async fn handle_activity_deleted(&self, activity_id: u64) -> Result<SyncOutcome> {
        if self.store.delete_session_by_external_id(activity_id).await? {
            tracing::info!(activity_id, "Deleted session for Strava activity");
            Ok(SyncOutcome::Deleted)
        } else {
            tracing::debug!(activity_id, "No session for deleted activity");
            Ok(SyncOutcome::Skipped(SkipReason::NoSession))
        }
    }

    /// Drop the connection of an athlete who revoked access. Synced sessions
    /// are kept.
    pub async fn handle_athlete_deauthorized(&self, athlete_id: u64) -> Result<SyncOutcome> {
        let removed = self.store.delete_connection(athlete_id).await?;
        self.strava.forget_athlete(athlete_id);
        if !removed {
            tracing::debug!(athlete_id, "Deauthorization for untracked athlete");
            return Ok(SyncOutcome::Skipped(SkipReason::UntrackedAthlete));
        }
        tracing::info!(athlete_id, "Athlete deauthorized, connection removed");
        Ok(SyncOutcome::Disconnected)
    }

    async fn import_activity(
        &self,
        activity_id: u64,
        activity: &StravaActivity,
    ) -> Result<SyncOutcome> {
        if self
            .store
            .get_session_by_external_id(activity_id)
            .await?
            .is_some()
        {
            tracing::debug!(activity_id, "Session already exists (idempotent skip)");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySynced));
        }

        match self
            .store
            .create_external_session(activity_id, session_fields(activity))
            .await?
        {
            Some(session) => {
                tracing::info!(
                    activity_id,
                    session_id = %session.id,
                    distance_km = session.distance,
                    "Created session from Strava activity"
                );
                Ok(SyncOutcome::Created)
            }
            // Lost the race with a concurrent delivery of the same event
            None => Ok(SyncOutcome::Skipped(SkipReason::AlreadySynced)),
        }
    }

    async fn mark_synced(&self, athlete_id: u64) {
        if let Err(e) = self.store.record_sync(athlete_id, Utc::now()).await {
            tracing::warn!(athlete_id, error = %e, "Failed to record last sync time");
        }
    }
}

/// Map a Strava activity onto session fields.
fn session_fields(activity: &StravaActivity) -> SessionFields {
    SessionFields {
        date: activity.start_date,
        distance: activity.distance / 1000.0,
        duration: activity.moving_time,
        notes: activity.name.clone(),
    }
}
