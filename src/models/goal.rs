// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Distance goals and derived progress.

use super::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Multiplier over the expected distance before a goal counts as "Ahead".
const AHEAD_FACTOR: f64 = 1.1;

/// A distance target over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    /// Target distance in kilometers
    pub target_distance: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a goal.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_goal_dates"))]
pub struct CreateGoalRequest {
    #[validate(range(exclusive_min = 0.0, message = "target distance must be greater than 0"))]
    pub target_distance: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

fn validate_goal_dates(req: &CreateGoalRequest) -> Result<(), ValidationError> {
    if req.end_date < req.start_date {
        let mut err = ValidationError::new("date_range");
        err.message = Some("end date must not be before start date".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    #[serde(rename = "On Track")]
    OnTrack,
    Behind,
    Ahead,
    Completed,
}

/// A goal plus progress computed from the sessions in its range.
#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    #[serde(flatten)]
    pub goal: Goal,
    pub current_distance: f64,
    pub progress_percentage: f64,
    pub expected_distance: f64,
    pub status: GoalStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sessions: Vec<Session>,
}

impl GoalProgress {
    /// Compute progress at `now`.
    ///
    /// `sessions` should already be limited to the goal's date range; sessions
    /// outside it are ignored anyway.
    pub fn compute(goal: Goal, sessions: Vec<Session>, now: DateTime<Utc>) -> Self {
        let sessions: Vec<Session> = sessions
            .into_iter()
            .filter(|s| s.date >= goal.start_date && s.date <= goal.end_date)
            .collect();
        let current: f64 = sessions.iter().map(|s| s.distance).sum();

        // Expected distance is linear in elapsed time, with now clamped to the range
        let calc_date = now.clamp(goal.start_date, goal.end_date);
        let total = (goal.end_date - goal.start_date).num_seconds() as f64;
        let elapsed = (calc_date - goal.start_date).num_seconds() as f64;
        let expected = if total > 0.0 {
            elapsed / total * goal.target_distance
        } else {
            0.0
        };

        let percentage = (current / goal.target_distance * 100.0).min(100.0);

        let status = if current >= goal.target_distance {
            GoalStatus::Completed
        } else if current < expected {
            GoalStatus::Behind
        } else if current > expected * AHEAD_FACTOR {
            GoalStatus::Ahead
        } else {
            GoalStatus::OnTrack
        };

        Self {
            goal,
            current_distance: round2(current),
            progress_percentage: round2(percentage),
            expected_distance: round2(expected),
            status,
            sessions,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionSource;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap()
    }

    fn goal(target: f64) -> Goal {
        Goal {
            id: "g1".to_string(),
            target_distance: target,
            start_date: at(1),
            end_date: at(11),
            created_at: at(1),
            updated_at: at(1),
        }
    }

    fn session(day: u32, distance: f64) -> Session {
        Session {
            id: format!("s{day}"),
            date: at(day),
            distance,
            duration: 1800,
            notes: String::new(),
            strava_activity_id: None,
            source: SessionSource::Manual,
            created_at: at(day),
            updated_at: at(day),
        }
    }

    #[test]
    fn test_halfway_on_track() {
        let progress = GoalProgress::compute(goal(100.0), vec![session(2, 52.0)], at(6));
        assert_eq!(progress.expected_distance, 50.0);
        assert_eq!(progress.current_distance, 52.0);
        assert_eq!(progress.progress_percentage, 52.0);
        assert_eq!(progress.status, GoalStatus::OnTrack);
    }

    #[test]
    fn test_behind_and_ahead() {
        let behind = GoalProgress::compute(goal(100.0), vec![session(2, 10.0)], at(6));
        assert_eq!(behind.status, GoalStatus::Behind);

        let ahead = GoalProgress::compute(goal(100.0), vec![session(2, 56.0)], at(6));
        assert_eq!(ahead.status, GoalStatus::Ahead);
    }

    #[test]
    fn test_completed_caps_percentage() {
        let progress = GoalProgress::compute(
            goal(10.0),
            vec![session(2, 8.0), session(3, 4.333)],
            at(4),
        );
        assert_eq!(progress.status, GoalStatus::Completed);
        assert_eq!(progress.progress_percentage, 100.0);
        assert_eq!(progress.current_distance, 12.33);
    }

    #[test]
    fn test_now_is_clamped_to_range() {
        let before = GoalProgress::compute(goal(100.0), vec![], at(1) - chrono::Duration::days(5));
        assert_eq!(before.expected_distance, 0.0);
        assert_eq!(before.status, GoalStatus::OnTrack);

        let after = GoalProgress::compute(goal(100.0), vec![session(5, 40.0)], at(25));
        assert_eq!(after.expected_distance, 100.0);
        assert_eq!(after.status, GoalStatus::Behind);
    }

    #[test]
    fn test_sessions_outside_range_ignored() {
        let progress = GoalProgress::compute(
            goal(100.0),
            vec![session(12, 30.0), session(3, 5.0)],
            at(6),
        );
        assert_eq!(progress.current_distance, 5.0);
        assert_eq!(progress.sessions.len(), 1);
    }

    #[test]
    fn test_zero_length_goal() {
        let mut g = goal(5.0);
        g.end_date = g.start_date;
        let progress = GoalProgress::compute(g, vec![], at(6));
        assert_eq!(progress.expected_distance, 0.0);
    }

    #[test]
    fn test_create_request_validation() {
        let ok = CreateGoalRequest {
            target_distance: 100.0,
            start_date: at(1),
            end_date: at(1),
        };
        assert!(ok.validate().is_ok());

        let reversed = CreateGoalRequest {
            target_distance: 100.0,
            start_date: at(5),
            end_date: at(1),
        };
        assert!(reversed.validate().is_err());

        let zero = CreateGoalRequest {
            target_distance: 0.0,
            start_date: at(1),
            end_date: at(5),
        };
        assert!(zero.validate().unwrap_err().field_errors().contains_key("target_distance"));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&GoalStatus::OnTrack).unwrap(),
            "\"On Track\""
        );
    }
}
