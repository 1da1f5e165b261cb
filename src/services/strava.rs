// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and connection/token management.
//!
//! Handles:
//! - OAuth code exchange and token refresh
//! - Activity fetching
//! - Lazy token refresh with a 5-minute margin, serialized per athlete

use crate::config::Config;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl StravaClient {
    /// Create a client from configuration. Missing OAuth credentials are
    /// only reported when a token call needs them.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.strava_api_url.trim_end_matches('/').to_string(),
            token_url: config.strava_oauth_token_url.clone(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
        })
    }

    fn credentials(&self) -> Result<(&str, &str), AppError> {
        let id = self
            .client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(AppError::ConfigMissing("STRAVA_CLIENT_ID"))?;
        let secret = self
            .client_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(AppError::ConfigMissing("STRAVA_CLIENT_SECRET"))?;
        Ok((id, secret))
    }

    /// Exchange an OAuth authorization code for tokens.
    pub async fn exchange_token(&self, code: &str) -> Result<TokenResponse, AppError> {
        let (client_id, client_secret) = self.credentials()?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Token exchange failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        let (client_id, client_secret) = self.credentials()?;

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Token refresh failed: {}", e)))?;

        check_response_json(response).await
    }

    /// Get an activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let url = format!("{}/activities/{}", self.base_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Transport(e.to_string()))?;

        check_response_json(response).await
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
        }
        return Err(AppError::StravaApi {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Transport(format!("Failed to read response: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::Decode(e.to_string()))
}

/// Token response from the OAuth endpoint (exchange and refresh).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as a Unix timestamp
    pub expires_at: i64,
    /// Only present on code exchange
    #[serde(default)]
    pub athlete: Option<StravaAthlete>,
}

impl TokenResponse {
    pub fn expires_at_utc(&self) -> Result<DateTime<Utc>, AppError> {
        DateTime::from_timestamp(self.expires_at, 0)
            .ok_or_else(|| AppError::Decode(format!("invalid expires_at {}", self.expires_at)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
}

/// Activity as returned by `GET /activities/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    /// Activity type (Run, Ride, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: i64,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub private: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - connection and token lifecycle
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::Store;
use crate::models::{Connection, ConnectionStatus};
use crate::services::vault::{self, TokenVault};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Shared refresh locks, keyed by athlete ID.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

fn token_is_fresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < expires_at
}

/// High-level Strava service that manages connections and token lifecycle.
///
/// Tokens are decrypted only when needed and never cached in plaintext;
/// the store holds the single source of truth.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    store: Arc<dyn Store>,
    vault: TokenVault,
    /// Per-athlete mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    pub fn new(client: StravaClient, store: Arc<dyn Store>, vault: TokenVault) -> Self {
        Self {
            client,
            store,
            vault,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Return a usable access token for `conn`, refreshing it if it expires
    /// within the margin.
    ///
    /// The new token is returned only after the refreshed pair has been
    /// persisted. Concurrent callers for the same athlete wait on one lock and
    /// re-read the stored connection, so only the first performs the refresh.
    pub async fn ensure_valid_access_token(&self, conn: &Connection) -> Result<String, AppError> {
        let athlete_id = conn.athlete_id;
        let access_token = self.vault.decrypt(&conn.access_token_encrypted)?;
        if token_is_fresh(conn.token_expires_at, Utc::now()) {
            return Ok(access_token);
        }

        let lock = self
            .refresh_locks
            .entry(athlete_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting
        let current = self
            .store
            .get_connection_by_athlete_id(athlete_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("connection for athlete {}", athlete_id)))?;
        if token_is_fresh(current.token_expires_at, Utc::now()) {
            tracing::debug!(athlete_id, "Token already refreshed by another task");
            return self.vault.decrypt(&current.access_token_encrypted);
        }

        tracing::info!(athlete_id, "Access token expired or expiring soon, refreshing");

        let refresh_token = self.vault.decrypt(&current.refresh_token_encrypted)?;
        let tokens = self.client.refresh_token(&refresh_token).await?;
        let expires_at = tokens.expires_at_utc()?;
        let (enc_access, enc_refresh) =
            vault::encrypt_tokens(&self.vault, &tokens.access_token, &tokens.refresh_token)?;

        self.store
            .update_tokens(athlete_id, &enc_access, &enc_refresh, expires_at)
            .await?;

        tracing::info!(athlete_id, %expires_at, "Token refreshed and stored");
        Ok(tokens.access_token)
    }

    /// Fetch an activity on behalf of the connection's athlete.
    pub async fn fetch_activity(
        &self,
        conn: &Connection,
        activity_id: u64,
    ) -> Result<StravaActivity, AppError> {
        let access_token = self.ensure_valid_access_token(conn).await?;
        self.client.get_activity(&access_token, activity_id).await
    }

    /// Drop the refresh lock of an athlete whose connection is gone.
    pub fn forget_athlete(&self, athlete_id: u64) {
        self.refresh_locks.remove(&athlete_id);
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.refresh_locks.len()
    }

    // ─── Connect / Disconnect ────────────────────────────────────────────────

    /// Exchange an authorization code and store the resulting connection,
    /// replacing any previous connection for the same athlete.
    pub async fn connect(&self, code: &str) -> Result<Connection, AppError> {
        let tokens = self.client.exchange_token(code).await?;
        let athlete_id = tokens
            .athlete
            .as_ref()
            .map(|a| a.id)
            .ok_or_else(|| AppError::Decode("token exchange response has no athlete".into()))?;
        let expires_at = tokens.expires_at_utc()?;

        let (enc_access, enc_refresh) =
            vault::encrypt_tokens(&self.vault, &tokens.access_token, &tokens.refresh_token)?;

        let connection = Connection {
            id: athlete_id.to_string(),
            user_id: None,
            athlete_id,
            access_token_encrypted: enc_access,
            refresh_token_encrypted: enc_refresh,
            token_expires_at: expires_at,
            connected_at: Utc::now(),
            last_sync: None,
        };
        self.store.create_connection(&connection).await?;

        tracing::info!(athlete_id, "Strava connected");
        Ok(connection)
    }

    /// Remove the current user's connection. Returns the athlete ID that was
    /// disconnected, or `None` if there was no connection.
    pub async fn disconnect(&self) -> Result<Option<u64>, AppError> {
        let Some(conn) = self.store.find_connection_for_user(None).await? else {
            return Ok(None);
        };

        self.store.delete_connection(conn.athlete_id).await?;
        self.forget_athlete(conn.athlete_id);
        tracing::info!(athlete_id = conn.athlete_id, "Strava disconnected");
        Ok(Some(conn.athlete_id))
    }

    /// Connection state for the current user.
    pub async fn status(&self) -> Result<ConnectionStatus, AppError> {
        Ok(self
            .store
            .find_connection_for_user(None)
            .await?
            .as_ref()
            .map(ConnectionStatus::from)
            .unwrap_or_default())
    }
}
