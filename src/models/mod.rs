// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod connection;
pub mod goal;
pub mod session;
pub mod webhook;

pub use connection::{Connection, ConnectionStatus};
pub use goal::{CreateGoalRequest, Goal, GoalProgress, GoalStatus};
pub use session::{Session, SessionFields, SessionRequest, SessionSource};
pub use webhook::{AspectType, ObjectType, WebhookEvent};
