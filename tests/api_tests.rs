// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session, goal and connection endpoints.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use common::{config_for, create_test_app, seed_connection, TestApp};
use runlog::config::Config;
use runlog::db::Store;
use runlog::models::SessionFields;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn session_body(distance: f64, duration: i64) -> Value {
    json!({
        "date": Utc::now().to_rfc3339(),
        "distance": distance,
        "duration": duration,
        "notes": "Easy run"
    })
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app(Config::default());
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_session_crud() {
    let app = create_test_app(Config::default());

    let (status, created) = send(&app, "POST", "/api/sessions", Some(session_body(5.0, 1500))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["source"], "manual");
    assert!(created.get("strava_activity_id").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["distance"], 5.0);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/sessions/{}", id),
        Some(session_body(6.5, 1900)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["distance"], 6.5);

    let (status, list) = send(&app, "GET", "/api/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, "GET", &format!("/api/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_session_validation() {
    let app = create_test_app(Config::default());

    let (status, json) = send(&app, "POST", "/api/sessions", Some(session_body(0.0, 1500))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");

    let (status, _) = send(&app, "POST", "/api/sessions", Some(session_body(5.0, 0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_list_date_filter() {
    let app = create_test_app(Config::default());
    let day = |s: &str| {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    };
    for date in [
        "2026-01-10T08:00:00Z",
        "2026-01-31T22:00:00Z",
        "2026-01-31T23:59:59.500Z",
        "2026-02-01T00:00:00Z",
    ] {
        app.store
            .create_session(SessionFields {
                date: day(date),
                distance: 5.0,
                duration: 1500,
                notes: String::new(),
            })
            .await
            .unwrap();
    }

    let (status, list) = send(
        &app,
        "GET",
        "/api/sessions?start_date=2026-01-01&end_date=2026-01-31",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let dates: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["date"].as_str().unwrap())
        .collect();
    // The end day is covered up to its last instant
    assert_eq!(dates.len(), 3);
    // Newest first
    assert!(dates[0].starts_with("2026-01-31T23:59:59.5"));
    assert!(dates[1].starts_with("2026-01-31T22"));

    let (status, _) = send(&app, "GET", "/api/sessions?start_date=January", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_synced_session_is_read_only() {
    let app = create_test_app(Config::default());
    let session = app
        .store
        .create_external_session(
            321,
            SessionFields {
                date: Utc::now(),
                distance: 10.0,
                duration: 3000,
                notes: "Strava run".to_string(),
            },
        )
        .await
        .unwrap()
        .unwrap();
    let uri = format!("/api/sessions/{}", session.id);

    let (status, json) = send(&app, "PUT", &uri, Some(session_body(1.0, 60))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    let (status, _) = send(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, fetched) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["source"], "strava");
    assert_eq!(fetched["strava_activity_id"], 321);
    assert_eq!(fetched["distance"], 10.0);
}

#[tokio::test]
async fn test_goal_lifecycle_with_progress() {
    let app = create_test_app(Config::default());
    let now = Utc::now();

    app.store
        .create_session(SessionFields {
            date: now - Duration::days(1),
            distance: 12.5,
            duration: 4000,
            notes: String::new(),
        })
        .await
        .unwrap();

    let (status, goal) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({
            "target_distance": 100.0,
            "start_date": (now - Duration::days(10)).to_rfc3339(),
            "end_date": (now + Duration::days(10)).to_rfc3339()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = goal["id"].as_str().unwrap().to_string();

    let (status, progress) = send(&app, "GET", &format!("/api/goals/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["current_distance"], 12.5);
    assert_eq!(progress["progress_percentage"], 12.5);
    assert_eq!(progress["status"], "Behind");
    assert_eq!(progress["sessions"].as_array().unwrap().len(), 1);

    let (status, list) = send(&app, "GET", "/api/goals", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/goals/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/api/goals/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_goal_validation() {
    let app = create_test_app(Config::default());

    let (status, _) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({
            "target_distance": 0.0,
            "start_date": "2026-01-01T00:00:00Z",
            "end_date": "2026-02-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "POST",
        "/api/goals",
        Some(json!({
            "target_distance": 50.0,
            "start_date": "2026-02-01T00:00:00Z",
            "end_date": "2026-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_strava_connect_status_disconnect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": 1_900_000_000,
            "athlete": {"id": 31337}
        })))
        .mount(&server)
        .await;
    let app = create_test_app(config_for(&server));

    let (status, json) = send(&app, "GET", "/api/strava/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"connected": false}));

    let (status, json) = send(&app, "POST", "/api/strava/connect", Some(json!({"code": "abc"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["strava_athlete_id"], 31337);

    let (status, json) = send(&app, "GET", "/api/strava/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["connected"], true);
    assert_eq!(json["strava_athlete_id"], 31337);
    assert!(json.get("access_token_encrypted").is_none());

    let (status, json) = send(&app, "DELETE", "/api/strava/disconnect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, _) = send(&app, "DELETE", "/api/strava/disconnect", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_strava_connect_requires_code() {
    let app = create_test_app(Config::default());
    let (status, json) = send(&app, "POST", "/api/strava/connect", Some(json!({"code": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_strava_connect_failure_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid code secret-detail"))
        .mount(&server)
        .await;
    let app = create_test_app(config_for(&server));

    let (status, json) = send(&app, "POST", "/api/strava/connect", Some(json!({"code": "bad"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({"error": "strava_error"}));
}

#[tokio::test]
async fn test_status_reports_last_sync() {
    let app = create_test_app(Config::default());
    seed_connection(&app, 55, "a", "r", Utc::now() + Duration::hours(1)).await;
    app.store.record_sync(55, Utc::now()).await.unwrap();

    let (status, json) = send(&app, "GET", "/api/strava/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["strava_athlete_id"], 55);
    assert!(json["last_sync"].is_string());
}
