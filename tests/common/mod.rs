// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Utc};
use runlog::config::Config;
use runlog::db::{MemoryStore, Store};
use runlog::models::Connection;
use runlog::routes::create_router;
use runlog::services::{vault, ActivitySync, StravaClient, StravaService, TokenVault};
use runlog::AppState;
use serde_json::json;
use std::sync::Arc;
use wiremock::MockServer;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Test config pointing all Strava calls at a mock server.
#[allow(dead_code)]
pub fn config_for(server: &MockServer) -> Config {
    Config {
        strava_api_url: server.uri(),
        strava_oauth_token_url: format!("{}/oauth/token", server.uri()),
        ..Config::default()
    }
}

/// A test app backed by the in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub vault: TokenVault,
}

/// Create a test app with an in-memory store and the given config.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();

    let vault = TokenVault::new(config.encryption_key.as_deref());
    let client = StravaClient::new(&config).expect("client should build");
    let strava_service = StravaService::new(client, dyn_store.clone(), vault.clone());
    let sync_service = ActivitySync::new(strava_service.clone(), dyn_store.clone());

    let state = Arc::new(AppState {
        config,
        store: dyn_store,
        strava_service,
        sync_service,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        vault,
    }
}

/// Store a connection with the given plaintext tokens.
#[allow(dead_code)]
pub async fn seed_connection(
    app: &TestApp,
    athlete_id: u64,
    access_token: &str,
    refresh_token: &str,
    expires_at: DateTime<Utc>,
) -> Connection {
    let (enc_access, enc_refresh) =
        vault::encrypt_tokens(&app.vault, access_token, refresh_token).unwrap();
    let conn = Connection {
        id: athlete_id.to_string(),
        user_id: None,
        athlete_id,
        access_token_encrypted: enc_access,
        refresh_token_encrypted: enc_refresh,
        token_expires_at: expires_at,
        connected_at: Utc::now(),
        last_sync: None,
    };
    app.store.create_connection(&conn).await.unwrap();
    conn
}

/// Strava activity JSON as returned by `GET /activities/{id}`.
#[allow(dead_code)]
pub fn activity_json(id: u64, name: &str, activity_type: &str, meters: f64, secs: i64) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "type": activity_type,
        "distance": meters,
        "moving_time": secs,
        "start_date": "2026-05-01T06:30:00Z",
        "private": false
    })
}
