// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! Data lives for the lifetime of the process. Each operation holds one lock,
//! so check-then-insert sequences inside a single call are atomic.

use super::{external_session_id, Store};
use crate::error::AppError;
use crate::models::{
    Connection, CreateGoalRequest, Goal, Session, SessionFields, SessionSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    connections: HashMap<u64, Connection>,
    sessions: HashMap<String, Session>,
    goals: HashMap<String, Goal>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    #[cfg(test)]
    fail_token_updates: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Database("memory store lock poisoned".to_string()))
    }

    /// Make subsequent `update_tokens` calls fail.
    #[cfg(test)]
    pub(crate) fn fail_token_updates(&self) {
        self.fail_token_updates
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

fn apply(session: &mut Session, fields: SessionFields, now: DateTime<Utc>) {
    session.date = fields.date;
    session.distance = fields.distance;
    session.duration = fields.duration;
    session.notes = fields.notes;
    session.updated_at = now;
}

fn new_session(
    id: String,
    fields: SessionFields,
    strava_activity_id: Option<u64>,
    source: SessionSource,
) -> Session {
    let now = Utc::now();
    Session {
        id,
        date: fields.date,
        distance: fields.distance,
        duration: fields.duration,
        notes: fields.notes,
        strava_activity_id,
        source,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_connection_by_athlete_id(
        &self,
        athlete_id: u64,
    ) -> Result<Option<Connection>, AppError> {
        Ok(self.lock()?.connections.get(&athlete_id).cloned())
    }

    async fn find_connection_for_user(
        &self,
        user_id: Option<i64>,
    ) -> Result<Option<Connection>, AppError> {
        Ok(self
            .lock()?
            .connections
            .values()
            .filter(|c| c.user_id == user_id)
            .max_by_key(|c| c.connected_at)
            .cloned())
    }

    async fn create_connection(&self, connection: &Connection) -> Result<(), AppError> {
        self.lock()?
            .connections
            .insert(connection.athlete_id, connection.clone());
        Ok(())
    }

    async fn update_tokens(
        &self,
        athlete_id: u64,
        access_token_encrypted: &str,
        refresh_token_encrypted: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        #[cfg(test)]
        if self
            .fail_token_updates
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(AppError::Database("injected write failure".to_string()));
        }

        let mut inner = self.lock()?;
        let conn = inner
            .connections
            .get_mut(&athlete_id)
            .ok_or_else(|| AppError::NotFound(format!("connection for athlete {}", athlete_id)))?;
        conn.access_token_encrypted = access_token_encrypted.to_string();
        conn.refresh_token_encrypted = refresh_token_encrypted.to_string();
        conn.token_expires_at = expires_at;
        Ok(())
    }

    async fn record_sync(&self, athlete_id: u64, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        let conn = inner
            .connections
            .get_mut(&athlete_id)
            .ok_or_else(|| AppError::NotFound(format!("connection for athlete {}", athlete_id)))?;
        conn.last_sync = Some(at);
        Ok(())
    }

    async fn delete_connection(&self, athlete_id: u64) -> Result<bool, AppError> {
        Ok(self.lock()?.connections.remove(&athlete_id).is_some())
    }

    async fn create_session(&self, fields: SessionFields) -> Result<Session, AppError> {
        let session = new_session(
            uuid::Uuid::new_v4().to_string(),
            fields,
            None,
            SessionSource::Manual,
        );
        self.lock()?
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn list_sessions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Session>, AppError> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.date >= start && s.date <= end)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(sessions)
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, AppError> {
        Ok(self.lock()?.sessions.get(id).cloned())
    }

    async fn update_session(
        &self,
        id: &str,
        fields: SessionFields,
    ) -> Result<Option<Session>, AppError> {
        let mut inner = self.lock()?;
        Ok(inner.sessions.get_mut(id).map(|session| {
            apply(session, fields, Utc::now());
            session.clone()
        }))
    }

    async fn delete_session(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.sessions.remove(id).is_some())
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
        let id = external_session_id(activity_id);
        let mut inner = self.lock()?;
        if inner.sessions.contains_key(&id) {
            return Ok(None);
        }
        let session = new_session(id.clone(), fields, Some(activity_id), SessionSource::Strava);
        inner.sessions.insert(id, session.clone());
        Ok(Some(session))
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
        self.lock()?.goals.insert(goal.id.clone(), goal.clone());
        Ok(goal)
    }

    async fn list_goals(&self) -> Result<Vec<Goal>, AppError> {
        let mut goals: Vec<Goal> = self.lock()?.goals.values().cloned().collect();
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(goals)
    }

    async fn get_goal(&self, id: &str) -> Result<Option<Goal>, AppError> {
        Ok(self.lock()?.goals.get(id).cloned())
    }

    async fn delete_goal(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.goals.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fields(distance: f64, date: DateTime<Utc>) -> SessionFields {
        SessionFields {
            date,
            distance,
            duration: 1200,
            notes: "easy".to_string(),
        }
    }

    #[tokio::test]
    async fn test_external_session_is_unique() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let first = store.create_external_session(42, fields(5.0, now)).await.unwrap();
        assert!(first.is_some());
        let second = store.create_external_session(42, fields(6.0, now)).await.unwrap();
        assert!(second.is_none());

        let stored = store.get_session_by_external_id(42).await.unwrap().unwrap();
        assert_eq!(stored.distance, 5.0);
        assert_eq!(stored.source, SessionSource::Strava);
        assert_eq!(stored.strava_activity_id, Some(42));
    }

    #[tokio::test]
    async fn test_list_sessions_range_and_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_session(fields(1.0, now - Duration::days(3))).await.unwrap();
        store.create_session(fields(2.0, now - Duration::days(1))).await.unwrap();
        store.create_session(fields(3.0, now - Duration::days(40))).await.unwrap();

        let sessions = store
            .list_sessions(now - Duration::days(7), now)
            .await
            .unwrap();
        let distances: Vec<f64> = sessions.iter().map(|s| s.distance).collect();
        assert_eq!(distances, vec![2.0, 1.0]);
    }

    #[tokio::test]
    async fn test_update_tokens_requires_connection() {
        let store = MemoryStore::new();
        let err = store
            .update_tokens(7, "a", "r", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
