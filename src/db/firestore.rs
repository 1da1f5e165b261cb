// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Connections (encrypted OAuth tokens, keyed by athlete ID)
//! - Sessions (manual and Strava-synced)
//! - Goals
//!
//! Timestamps are stored as RFC3339 strings with a `Z` suffix so that range
//! filters and ordering work on the raw field values.

use super::{collections, external_session_id, Store};
use crate::error::AppError;
use crate::models::{
    Connection, CreateGoalRequest, Goal, Session, SessionFields, SessionSource,
};
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::{paths, FirestoreWritePrecondition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ─── Document types ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConnectionDoc {
    athlete_id: u64,
    user_id: Option<i64>,
    access_token_encrypted: String,
    refresh_token_encrypted: String,
    token_expires_at: String,
    connected_at: String,
    last_sync: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionDoc {
    id: String,
    date: String,
    distance: f64,
    duration: i64,
    notes: String,
    strava_activity_id: Option<u64>,
    source: SessionSource,
    created_at: String,
    updated_at: String,
}

/// Token columns rewritten on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFieldsDoc {
    access_token_encrypted: String,
    refresh_token_encrypted: String,
    token_expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SyncFieldsDoc {
    last_sync: String,
}

/// Session columns that updates may touch. `source`, `strava_activity_id`
/// and `created_at` are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionFieldsDoc {
    date: String,
    distance: f64,
    duration: i64,
    notes: String,
    updated_at: String,
}

impl SessionFieldsDoc {
    fn new(fields: SessionFields, updated_at: DateTime<Utc>) -> Self {
        Self {
            date: format_utc_rfc3339(fields.date),
            distance: fields.distance,
            duration: fields.duration,
            notes: fields.notes,
            updated_at: format_utc_rfc3339(updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GoalDoc {
    id: String,
    target_distance: f64,
    start_date: String,
    end_date: String,
    created_at: String,
}

fn parse_ts(field: &str, value: &str) -> Result<DateTime<Utc>, AppError> {
    parse_utc_rfc3339(value)
        .map_err(|e| AppError::Database(format!("Invalid timestamp in {}: {}", field, e)))
}

impl From<&Connection> for ConnectionDoc {
    fn from(c: &Connection) -> Self {
        Self {
            athlete_id: c.athlete_id,
            user_id: c.user_id,
            access_token_encrypted: c.access_token_encrypted.clone(),
            refresh_token_encrypted: c.refresh_token_encrypted.clone(),
            token_expires_at: format_utc_rfc3339(c.token_expires_at),
            connected_at: format_utc_rfc3339(c.connected_at),
            last_sync: c.last_sync.map(format_utc_rfc3339),
        }
    }
}

impl TryFrom<ConnectionDoc> for Connection {
    type Error = AppError;

    fn try_from(doc: ConnectionDoc) -> Result<Self, AppError> {
        Ok(Self {
            id: doc.athlete_id.to_string(),
            user_id: doc.user_id,
            athlete_id: doc.athlete_id,
            token_expires_at: parse_ts("token_expires_at", &doc.token_expires_at)?,
            connected_at: parse_ts("connected_at", &doc.connected_at)?,
            last_sync: doc
                .last_sync
                .as_deref()
                .map(|s| parse_ts("last_sync", s))
                .transpose()?,
            access_token_encrypted: doc.access_token_encrypted,
            refresh_token_encrypted: doc.refresh_token_encrypted,
        })
    }
}

impl From<&Session> for SessionDoc {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            date: format_utc_rfc3339(s.date),
            distance: s.distance,
            duration: s.duration,
            notes: s.notes.clone(),
            strava_activity_id: s.strava_activity_id,
            source: s.source,
            created_at: format_utc_rfc3339(s.created_at),
            updated_at: format_utc_rfc3339(s.updated_at),
        }
    }
}

impl TryFrom<SessionDoc> for Session {
    type Error = AppError;

    fn try_from(doc: SessionDoc) -> Result<Self, AppError> {
        Ok(Self {
            date: parse_ts("date", &doc.date)?,
            created_at: parse_ts("created_at", &doc.created_at)?,
            updated_at: parse_ts("updated_at", &doc.updated_at)?,
            id: doc.id,
            distance: doc.distance,
            duration: doc.duration,
            notes: doc.notes,
            strava_activity_id: doc.strava_activity_id,
            source: doc.source,
        })
    }
}

impl From<&Goal> for GoalDoc {
    fn from(g: &Goal) -> Self {
        Self {
            id: g.id.clone(),
            target_distance: g.target_distance,
            start_date: format_utc_rfc3339(g.start_date),
            end_date: format_utc_rfc3339(g.end_date),
            created_at: format_utc_rfc3339(g.created_at),
        }
    }
}

impl TryFrom<GoalDoc> for Goal {
    type Error = AppError;

    fn try_from(doc: GoalDoc) -> Result<Self, AppError> {
        let created_at = parse_ts("created_at", &doc.created_at)?;
        Ok(Self {
            start_date: parse_ts("start_date", &doc.start_date)?,
            end_date: parse_ts("end_date", &doc.end_date)?,
            id: doc.id,
            target_distance: doc.target_distance,
            created_at,
            // Goals are immutable once created
            updated_at: created_at,
        })
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    timeout: Duration,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, timeout: Duration) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, timeout).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            timeout,
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, timeout: Duration) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            timeout,
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations return an error.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Run a store operation under the configured timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                AppError::Database(format!("{} timed out after {:?}", op, self.timeout))
            })?
    }

    async fn read_connection(&self, athlete_id: u64) -> Result<Option<ConnectionDoc>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CONNECTIONS)
            .obj()
            .one(&athlete_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_connection(&self, doc: &ConnectionDoc) -> Result<(), AppError> {
        let _: ConnectionDoc = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CONNECTIONS)
            .document_id(doc.athlete_id.to_string())
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn read_session(&self, id: &str) -> Result<Option<SessionDoc>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn write_session(&self, doc: &SessionDoc) -> Result<(), AppError> {
        let _: SessionDoc = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&doc.id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write only the masked `fields` of an existing document.
    ///
    /// The write carries an `Exists(true)` precondition, so it never
    /// recreates a document deleted in the meantime, and the mask leaves
    /// columns owned by other writers untouched. Returns the updated document,
    /// or `None` if it does not exist.
    async fn patch<P, D>(
        &self,
        collection: &str,
        id: &str,
        fields: Vec<String>,
        patch: &P,
    ) -> Result<Option<D>, AppError>
    where
        P: Serialize + for<'de> Deserialize<'de> + Sync + Send,
        D: DeserializeOwned + Send,
    {
        let result: Result<D, FirestoreError> = self
            .get_client()?
            .fluent()
            .update()
            .fields(fields)
            .in_col(collection)
            .precondition(FirestoreWritePrecondition::Exists(true))
            .document_id(id)
            .object(patch)
            .execute()
            .await;

        match result {
            Ok(doc) => Ok(Some(doc)),
            Err(FirestoreError::DataNotFoundError(_)) => Ok(None),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn modify_session(
        &self,
        id: &str,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError> {
        let patch = SessionFieldsDoc::new(fields, Utc::now());
        let doc: Option<SessionDoc> = self
            .patch(
                collections::SESSIONS,
                id,
                paths!(SessionFieldsDoc::{date, distance, duration, notes, updated_at}),
                &patch,
            )
            .await?;
        doc.map(Session::try_from).transpose()
    }

    async fn patch_connection<P: Serialize + for<'de> Deserialize<'de> + Sync + Send>(
        &self,
        athlete_id: u64,
        fields: Vec<String>,
        patch: &P,
    ) -> Result<(), AppError> {
        let doc: Option<ConnectionDoc> = self
            .patch(
                collections::CONNECTIONS,
                &athlete_id.to_string(),
                fields,
                patch,
            )
            .await?;
        doc.map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("connection for athlete {}", athlete_id)))
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn remove_session(&self, id: &str) -> Result<bool, AppError> {
        if self.read_session(id).await?.is_none() {
            return Ok(false);
        }
        self.remove(collections::SESSIONS, id).await?;
        Ok(true)
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Connection Operations ───────────────────────────────────

    async fn get_connection_by_athlete_id(
        &self,
        athlete_id: u64,
    ) -> Result<Option<Connection>, AppError> {
        self.bounded("get_connection", async {
            self.read_connection(athlete_id)
                .await?
                .map(Connection::try_from)
                .transpose()
        })
        .await
    }

    async fn find_connection_for_user(
        &self,
        user_id: Option<i64>,
    ) -> Result<Option<Connection>, AppError> {
        self.bounded("find_connection", async {
            // Single-tenant deployments hold at most a handful of connections
            let docs: Vec<ConnectionDoc> = self
                .get_client()?
                .fluent()
                .select()
                .from(collections::CONNECTIONS)
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            let mut matching = docs
                .into_iter()
                .filter(|d| d.user_id == user_id)
                .map(Connection::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            matching.sort_by(|a, b| b.connected_at.cmp(&a.connected_at));
            Ok(matching.into_iter().next())
        })
        .await
    }

    async fn create_connection(&self, connection: &Connection) -> Result<(), AppError> {
        self.bounded(
            "create_connection",
            self.write_connection(&ConnectionDoc::from(connection)),
        )
        .await
    }

    async fn update_tokens(
        &self,
        athlete_id: u64,
        access_token_encrypted: &str,
        refresh_token_encrypted: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let patch = TokenFieldsDoc {
            access_token_encrypted: access_token_encrypted.to_string(),
            refresh_token_encrypted: refresh_token_encrypted.to_string(),
            token_expires_at: format_utc_rfc3339(expires_at),
        };
        self.bounded(
            "update_tokens",
            self.patch_connection(
                athlete_id,
                paths!(TokenFieldsDoc::{
                    access_token_encrypted,
                    refresh_token_encrypted,
                    token_expires_at
                }),
                &patch,
            ),
        )
        .await
    }

    async fn record_sync(&self, athlete_id: u64, at: DateTime<Utc>) -> Result<(), AppError> {
        let patch = SyncFieldsDoc {
            last_sync: format_utc_rfc3339(at),
        };
        self.bounded(
            "record_sync",
            self.patch_connection(athlete_id, paths!(SyncFieldsDoc::{last_sync}), &patch),
        )
        .await
    }

    async fn delete_connection(&self, athlete_id: u64) -> Result<bool, AppError> {
        self.bounded("delete_connection", async {
            if self.read_connection(athlete_id).await?.is_none() {
                return Ok(false);
            }
            self.remove(collections::CONNECTIONS, &athlete_id.to_string())
                .await?;
            Ok(true)
        })
        .await
    }

    // ─── Session Operations ──────────────────────────────────────

    async fn create_session(&self, fields: SessionFields) -> Result<Session, AppError> {
        let now = Utc::now();
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            date: fields.date,
            distance: fields.distance,
            duration: fields.duration,
            notes: fields.notes,
            strava_activity_id: None,
            source: SessionSource::Manual,
            created_at: now,
            updated_at: now,
        };
        self.bounded(
            "create_session",
            self.write_session(&SessionDoc::from(&session)),
        )
        .await?;
        Ok(session)
    }

    async fn list_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>, AppError> {
        let start = format_utc_rfc3339(start);
        let end = format_utc_rfc3339(end);

        self.bounded("list_sessions", async {
            let docs: Vec<SessionDoc> = self
                .get_client()?
                .fluent()
                .select()
                .from(collections::SESSIONS)
                .filter(move |q| {
                    q.for_all([
                        q.field("date").greater_than_or_equal(start.clone()),
                        q.field("date").less_than_or_equal(end.clone()),
                    ])
                })
                .order_by([("date", firestore::FirestoreQueryDirection::Descending)])
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            docs.into_iter().map(Session::try_from).collect()
        })
        .await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, AppError> {
        self.bounded("get_session", async {
            self.read_session(id)
                .await?
                .map(Session::try_from)
                .transpose()
        })
        .await
    }

    async fn update_session(
        &self,
        id: &str,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError> {
        self.bounded("update_session", self.modify_session(id, fields))
            .await
    }

    async fn delete_session(&self, id: &str) -> Result<bool, AppError> {
        self.bounded("delete_session", self.remove_session(id)).await
    }

    async fn get_session_by_external_id(
        &self,
        activity_id: u64,
    ) -> Result<Option<Session>, AppError> {
        self.get_session(&external_session_id(activity_id)).await
    }

    async fn create_external_session(
        &self,
        activity_id: u64,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError> {
        let now = Utc::now();
        let session = Session {
            id: external_session_id(activity_id),
            date: fields.date,
            distance: fields.distance,
            duration: fields.duration,
            notes: fields.notes,
            strava_activity_id: Some(activity_id),
            source: SessionSource::Strava,
            created_at: now,
            updated_at: now,
        };
        let doc = SessionDoc::from(&session);

        self.bounded("create_external_session", async {
            // insert() fails if the document exists, which makes the
            // activity ID a unique key even under concurrent deliveries
            let result: Result<SessionDoc, _> = self
                .get_client()?
                .fluent()
                .insert()
                .into(collections::SESSIONS)
                .document_id(&doc.id)
                .object(&doc)
                .execute()
                .await;

            match result {
                Ok(_) => Ok(Some(session)),
                Err(FirestoreError::DataConflictError(_)) => {
                    tracing::debug!(activity_id, "Synced session already exists");
                    Ok(None)
                }
                Err(e) => Err(AppError::Database(e.to_string())),
            }
        })
        .await
    }

    async fn update_external_session(
        &self,
        activity_id: u64,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError> {
        self.update_session(&external_session_id(activity_id), fields)
            .await
    }

    async fn delete_session_by_external_id(&self, activity_id: u64) -> Result<bool, AppError> {
        self.delete_session(&external_session_id(activity_id)).await
    }

    // ─── Goal Operations ─────────────────────────────────────────

    async fn create_goal(&self, req: &CreateGoalRequest) -> Result<Goal, AppError> {
        let now = Utc::now();
        let goal = Goal {
            id: uuid::Uuid::new_v4().to_string(),
            target_distance: req.target_distance,
            start_date: req.start_date,
            end_date: req.end_date,
            created_at: now,
            updated_at: now,
        };
        let doc = GoalDoc::from(&goal);

        self.bounded("create_goal", async {
            let _: GoalDoc = self
                .get_client()?
                .fluent()
                .update()
                .in_col(collections::GOALS)
                .document_id(&doc.id)
                .object(&doc)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            Ok(())
        })
        .await?;
        Ok(goal)
    }

    async fn list_goals(&self) -> Result<Vec<Goal>, AppError> {
        self.bounded("list_goals", async {
            let docs: Vec<GoalDoc> = self
                .get_client()?
                .fluent()
                .select()
                .from(collections::GOALS)
                .order_by([(
                    "created_at",
                    firestore::FirestoreQueryDirection::Descending,
                )])
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            docs.into_iter().map(Goal::try_from).collect()
        })
        .await
    }

    async fn get_goal(&self, id: &str) -> Result<Option<Goal>, AppError> {
        self.bounded("get_goal", async {
            let doc: Option<GoalDoc> = self
                .get_client()?
                .fluent()
                .select()
                .by_id_in(collections::GOALS)
                .obj()
                .one(id)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            doc.map(Goal::try_from).transpose()
        })
        .await
    }

    async fn delete_goal(&self, id: &str) -> Result<bool, AppError> {
        self.bounded("delete_goal", async {
            if self.get_goal(id).await?.is_none() {
                return Ok(false);
            }
            self.remove(collections::GOALS, id).await?;
            Ok(true)
        })
        .await
    }
}
