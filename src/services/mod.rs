// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod strava;
pub mod sync;
pub mod vault;

pub use strava::{StravaClient, StravaService};
pub use sync::{ActivitySync, SkipReason, SyncOutcome};
pub use vault::TokenVault;
