// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runlog: a single-user running log with Strava sync
//!
//! This crate provides the backend API for recording training sessions and
//! distance goals, and for keeping sessions in sync with Strava activities
//! through OAuth and webhooks.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{ActivitySync, StravaService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub strava_service: StravaService,
    pub sync_service: ActivitySync,
}
