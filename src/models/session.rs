// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training session model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Where a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Manual,
    Strava,
}

/// A recorded training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub date: DateTime<Utc>,
    /// Distance in kilometers
    pub distance: f64,
    /// Duration in seconds
    pub duration: i64,
    pub notes: String,
    /// Strava activity ID; only set for synced sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strava_activity_id: Option<u64>,
    pub source: SessionSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// True if this session is owned by the sync engine.
    pub fn is_synced(&self) -> bool {
        self.source == SessionSource::Strava
    }
}

/// Writable session fields, shared by manual and synced writes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFields {
    pub date: DateTime<Utc>,
    pub distance: f64,
    pub duration: i64,
    pub notes: String,
}

/// Request body for creating or replacing a manual session.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SessionRequest {
    pub date: DateTime<Utc>,
    #[validate(range(exclusive_min = 0.0, message = "distance must be greater than 0"))]
    pub distance: f64,
    #[validate(range(min = 1, message = "duration must be greater than 0"))]
    pub duration: i64,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub notes: String,
}

impl From<SessionRequest> for SessionFields {
    fn from(req: SessionRequest) -> Self {
        Self {
            date: req.date,
            distance: req.distance,
            duration: req.duration,
            notes: req.notes,
        }
    }
}
