use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use routeboard::config::{Config, LettersConfig};
use routeboard::letters::store::JournalStore;
use routeboard::letters::LetterService;
use routeboard::seed::seed_demo_data;
use routeboard::server::{router, AppState};
use routeboard::storage::{InMemoryStorage, Storage};

fn seed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

async fn test_app() -> Router {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    seed_demo_data(storage.as_ref(), seed_date()).await.unwrap();

    let store = Arc::new(JournalStore::open_in_memory().unwrap());
    let letters = Arc::new(LetterService::new(
        store,
        None,
        None,
        LettersConfig::default(),
    ));

    router(AppState {
        storage,
        letters,
        config: Arc::new(Config::default()),
        metrics_handle: None,
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn login_issues_a_token_for_valid_credentials() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth-login",
        Some(json!({"role": "DRIVER", "id": "driver-1", "pin": "1111"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["role"], "DRIVER");
    assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn login_rejects_a_wrong_pin_and_a_bad_role() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth-login",
        Some(json!({"role": "DRIVER", "id": "driver-1", "pin": "0000"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("Invalid credentials"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth-login",
        Some(json!({"role": "GUEST", "id": "driver-1", "pin": "1111"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn today_joins_location_fields_onto_stops() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/today?date={}&driverId=driver-1", seed_date()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routeDay"]["driver_id"], "driver-1");

    let stops = body["stops"].as_array().unwrap();
    assert_eq!(stops.len(), 3);
    assert!(stops[0]["location_name"].as_str().is_some());
    assert_eq!(stops[0]["status"], "READY");
}

#[tokio::test]
async fn today_is_404_for_a_driver_without_a_route() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/today?date={}&driverId=driver-99", seed_date()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("No route found"));
}

#[tokio::test]
async fn stop_complete_validates_the_delivered_type() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/stop-complete",
        Some(json!({"stopId": "stop-1-1", "deliveredType": "TELEPORTED"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid deliveredType"));
}

#[tokio::test]
async fn stop_complete_records_events_and_updates_the_stop() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/stop-complete",
        Some(json!({
            "stopId": "stop-1-1",
            "deliveredType": "DELIVERED",
            "note": "left at the loading dock",
            "userId": "driver-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stop"]["status"], "COMPLETED");
    assert_eq!(body["stop"]["delivered_type"], "DELIVERED");
    assert!(body["stop"]["completed_at"].as_str().is_some());

    let (status, body) = send(&app, "GET", "/api/stops/stop-1-1/events", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| e["type"] == "NOTE"));
    assert!(events
        .iter()
        .any(|e| e["type"] == "SYSTEM" && e["content"] == "stop completed: delivered"));
}

#[tokio::test]
async fn completing_an_unknown_stop_is_404() {
    let app = test_app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/stop-complete",
        Some(json!({"stopId": "stop-nope", "deliveredType": "BOTH"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn location_patch_updates_the_entry_instruction() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "PATCH",
        "/api/locations/loc-2",
        Some(json!({"entry_instruction_text": "Buzz unit 301"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"]["entry_instruction_text"], "Buzz unit 301");
}

#[tokio::test]
async fn route_day_eta_flags_late_stops_in_order() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/api/route-days/rd-1/eta", None).await;
    assert_eq!(status, StatusCode::OK);

    let stops = body["stops"].as_array().unwrap();
    assert_eq!(stops.len(), 3, "all seeded stops are remaining");
    for estimate in stops {
        assert!(estimate["eta_time"].as_str().unwrap().contains(':'));
        assert!(estimate["late_risk"].is_boolean());
    }
    // Arrival sequence is strictly increasing.
    let etas: Vec<&str> = stops.iter().map(|s| s["eta"].as_str().unwrap()).collect();
    let mut sorted = etas.clone();
    sorted.sort();
    assert_eq!(etas, sorted);
}

#[tokio::test]
async fn diary_post_twice_overwrites_for_the_same_date() {
    let app = test_app().await;
    let entry = json!({
        "email": "mina@example.com",
        "content": "first version",
        "date": "2026-03-01"
    });
    let (status, _) = send(&app, "POST", "/api/diary", Some(entry)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/diary",
        Some(json!({
            "email": "mina@example.com",
            "content": "second version",
            "mood": "calm",
            "date": "2026-03-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/diary?email=mina@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["content"], "second version");
}

#[tokio::test]
async fn phrases_round_trip_and_delete() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/phrases",
        Some(json!({
            "email": "mina@example.com",
            "content": "Begin again, quietly.",
            "author": "Unknown"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let phrase_id = body["phrase"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/phrases/{phrase_id}?email=mina@example.com"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/phrases?email=mina@example.com", None).await;
    assert!(body["phrases"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn daily_report_counts_completions_per_driver() {
    let app = test_app().await;
    send(
        &app,
        "POST",
        "/api/stop-complete",
        Some(json!({"stopId": "stop-1-1", "deliveredType": "BOTH"})),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/report/daily?date={}", seed_date()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let driver_one = rows
        .iter()
        .find(|r| r["driver_id"] == "driver-1")
        .expect("driver-1 row");
    assert_eq!(driver_one["total_stops"], 3);
    assert_eq!(driver_one["completed_stops"], 1);
}

#[tokio::test]
async fn health_reports_the_service_name() {
    let app = test_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "routeboard");
}
