// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava webhook event payload.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Activity,
    Athlete,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectType {
    Create,
    Update,
    Delete,
    #[serde(other)]
    Unknown,
}

/// Webhook event delivered by Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub object_type: ObjectType,
    /// Activity ID or athlete ID, depending on `object_type`
    pub object_id: u64,
    pub aspect_type: AspectType,
    /// Athlete who owns the object
    pub owner_id: u64,
    /// Changed fields (update events only)
    #[serde(default)]
    pub updates: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub subscription_id: Option<u64>,
    #[serde(default)]
    pub event_time: Option<i64>,
}

impl WebhookEvent {
    /// String value of an entry in `updates`.
    ///
    /// Strava sends flags such as `private` and `authorized` as JSON strings;
    /// non-string values yield `None`.
    pub fn update_str(&self, key: &str) -> Option<&str> {
        self.updates.get(key).and_then(|v| v.as_str())
    }
}
