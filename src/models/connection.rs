// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava connection model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored OAuth connection for one Strava athlete.
///
/// Token fields hold vault ciphertext and are never serialized to API
/// responses; use [`ConnectionStatus`] for that.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: String,
    /// Owning local user; unused while the service is single-tenant
    pub user_id: Option<i64>,
    /// Strava athlete ID (storage key)
    pub athlete_id: u64,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    pub token_expires_at: DateTime<Utc>,
    pub connected_at: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Connection state returned to the frontend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strava_athlete_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl From<&Connection> for ConnectionStatus {
    fn from(conn: &Connection) -> Self {
        Self {
            connected: true,
            strava_athlete_id: Some(conn.athlete_id),
            connected_at: Some(conn.connected_at),
            last_sync: conn.last_sync,
        }
    }
}
