// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runlog API Server
//!
//! Records running sessions and goals, and syncs runs from Strava.

use runlog::{
    config::Config,
    db::{FirestoreDb, MemoryStore, Store},
    services::{ActivitySync, StravaClient, StravaService, TokenVault},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Runlog API");

    let store: Arc<dyn Store> = match config.gcp_project_id.as_deref() {
        Some(project_id) => Arc::new(
            FirestoreDb::new(project_id, Duration::from_secs(config.store_timeout_secs)).await?,
        ),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory store (data is not persisted)");
            Arc::new(MemoryStore::new())
        }
    };

    if config.encryption_key.is_none() {
        tracing::warn!("ENCRYPTION_KEY not set, Strava connections are unavailable");
    }
    if config.webhook_verify_token.is_none() {
        tracing::warn!("STRAVA_VERIFY_TOKEN not set, webhook verification will fail");
    }

    let vault = TokenVault::new(config.encryption_key.as_deref());
    let client = StravaClient::new(&config)?;
    let strava_service = StravaService::new(client, store.clone(), vault);
    let sync_service = ActivitySync::new(strava_service.clone(), store.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        strava_service,
        sync_service,
    });

    // Build router
    let app = runlog::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("runlog=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
