use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use slotbook::config::{AppConfig, SchedulingConfig};
use slotbook::db;
use slotbook::handlers;
use slotbook::models::{BookingEvent, BookingEventKind};
use slotbook::services::notify::NotificationSink;
use slotbook::state::AppState;

// ── Mock sink ──

struct RecordingSink {
    events: Arc<Mutex<Vec<BookingEvent>>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, event: &BookingEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ── Helpers ──

const ADMIN: &str = "test-token";
const PROVIDER: &str = "prov-1";
const CUSTOMER: &str = "cust-1";
const OTHER_CUSTOMER: &str = "cust-2";
const DAY: &str = "2030-01-07";

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: ADMIN.to_string(),
        notify_webhook_url: String::new(),
        notify_webhook_secret: String::new(),
        scheduling: SchedulingConfig::default(),
    }
}

fn test_state() -> (Arc<AppState>, Arc<Mutex<Vec<BookingEvent>>>) {
    let conn = db::init_db(":memory:").unwrap();
    let events = Arc::new(Mutex::new(vec![]));
    let sink = RecordingSink {
        events: Arc::clone(&events),
    };
    let state = Arc::new(AppState::new(conn, test_config(), Arc::new(sink)));
    (state, events)
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(app, request(method, uri, user, body)).await
}

async fn seed_user(app: &Router, id: &str, role: &str) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/users")
        .header("Authorization", format!("Bearer {ADMIN}"))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({"id": id, "display_name": id, "role": role}).to_string(),
        ))
        .unwrap();
    let (status, _) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED);
}

/// App with one provider and two customers.
async fn seeded_app() -> (Router, Arc<AppState>, Arc<Mutex<Vec<BookingEvent>>>) {
    let (state, events) = test_state();
    let app = handlers::router(Arc::clone(&state));
    seed_user(&app, PROVIDER, "provider").await;
    seed_user(&app, CUSTOMER, "customer").await;
    seed_user(&app, OTHER_CUSTOMER, "customer").await;
    (app, state, events)
}

async fn create_service(app: &Router, duration: u32) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/services",
        Some(PROVIDER),
        Some(json!({
            "name": format!("{duration} minute cut"),
            "category": "salon_beauty",
            "price_cents": 3500,
            "duration_minutes": duration,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn generate(app: &Router, service_id: &str, start: &str, end: &str) -> Vec<Value> {
    let (status, body) = call(
        app,
        "POST",
        "/api/availability/generate",
        Some(PROVIDER),
        Some(json!({
            "service_id": service_id,
            "start_date": DAY,
            "window_start": start,
            "window_end": end,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["created"].as_array().unwrap().clone()
}

async fn open_units(app: &Router) -> Vec<Value> {
    let (status, body) = call(
        app,
        "GET",
        &format!("/api/providers/{PROVIDER}/availability?open_only=true"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().unwrap().clone()
}

async fn book(app: &Router, customer: &str, unit_id: &str) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/api/bookings",
        Some(customer),
        Some(json!({"availability_id": unit_id, "customer_notes": "see you"})),
    )
    .await
}

fn unit_at<'a>(units: &'a [Value], start: &str) -> &'a str {
    units
        .iter()
        .find(|u| u["start_time"] == start)
        .and_then(|u| u["id"].as_str())
        .unwrap()
}

// ── Health & auth ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let app = handlers::router(state);
    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_admin_requires_token() {
    let (state, _) = test_state();
    let app = handlers::router(state);

    let body = Some(json!({"display_name": "Ana", "role": "provider"}));
    let (status, body_out) = call(&app, "POST", "/api/admin/users", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_out["kind"], "unauthorized");

    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/users")
        .header("Authorization", "Bearer wrong-token")
        .header("Content-Type", "application/json")
        .body(Body::from(body.unwrap().to_string()))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_user_is_unauthorized() {
    let (app, _, _) = seeded_app().await;
    let (status, _) = call(&app, "GET", "/api/bookings", Some("nobody"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, "GET", "/api/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_rejects_unknown_role() {
    let (state, _) = test_state();
    let app = handlers::router(state);
    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/users")
        .header("Authorization", format!("Bearer {ADMIN}"))
        .header("Content-Type", "application/json")
        .body(Body::from(
            json!({"display_name": "Root", "role": "admin"}).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

// ── Catalog ──

#[tokio::test]
async fn test_service_catalog() {
    let (app, _, _) = seeded_app().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/services",
        Some(PROVIDER),
        Some(json!({"name": "Cut", "category": "salon_beauty", "price_cents": 100, "duration_minutes": 45})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = call(
        &app,
        "POST",
        "/api/services",
        Some(CUSTOMER),
        Some(json!({"name": "Cut", "category": "salon_beauty", "price_cents": 100, "duration_minutes": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let id = create_service(&app, 60).await;
    let (status, body) = call(&app, "GET", &format!("/api/services/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duration_minutes"], 60);

    // Deactivate: hidden from discovery, still listed for the owner
    let (status, _) = call(
        &app,
        "PUT",
        &format!("/api/services/{id}"),
        Some(PROVIDER),
        Some(json!({"name": "Cut", "category": "salon_beauty", "price_cents": 3500, "duration_minutes": 60, "is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, public) = call(&app, "GET", &format!("/api/providers/{PROVIDER}/services"), None, None).await;
    assert!(public.as_array().unwrap().is_empty());
    let (_, mine) = call(&app, "GET", "/api/services", Some(PROVIDER), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "DELETE", &format!("/api/services/{id}"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "GET", &format!("/api/services/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Availability ──

#[tokio::test]
async fn test_generate_window_into_units() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;

    let created = generate(&app, &service, "09:00", "12:00").await;
    let starts: Vec<_> = created.iter().map(|u| u["start_time"].clone()).collect();
    assert_eq!(starts, vec![json!("09:00"), json!("10:00"), json!("11:00")]);

    // Re-running is a no-op
    assert!(generate(&app, &service, "09:00", "12:00").await.is_empty());
    assert_eq!(open_units(&app).await.len(), 3);

    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/providers/{PROVIDER}/availability/range?from=2030-01-01"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["earliest_date"], DAY);
    assert_eq!(body["latest_date"], DAY);
}

#[tokio::test]
async fn test_deactivated_service_leaves_discovery() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;
    generate(&app, &service, "09:00", "11:00").await;
    assert_eq!(open_units(&app).await.len(), 2);

    let (status, _) = call(
        &app,
        "PUT",
        &format!("/api/services/{service}"),
        Some(PROVIDER),
        Some(json!({"name": "Cut", "category": "salon_beauty", "price_cents": 3500, "duration_minutes": 60, "is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(open_units(&app).await.is_empty());
    let (status, body) = call(
        &app,
        "GET",
        &format!("/api/providers/{PROVIDER}/availability/range?from=2030-01-01"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["earliest_date"].is_null());
    assert!(body["latest_date"].is_null());
}

#[tokio::test]
async fn test_generate_rejects_bad_input() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/availability/generate",
        Some(PROVIDER),
        Some(json!({"service_id": service, "start_date": "07/01/2030", "window_start": "09:00", "window_end": "12:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = call(
        &app,
        "POST",
        "/api/availability/generate",
        Some(CUSTOMER),
        Some(json!({"service_id": service, "start_date": DAY, "window_start": "09:00", "window_end": "12:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_toggle_and_delete_unit() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;
    let units = generate(&app, &service, "09:00", "11:00").await;
    let first = unit_at(&units, "09:00").to_string();
    let second = unit_at(&units, "10:00").to_string();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/availability/{first}/toggle"),
        Some(PROVIDER),
        Some(json!({"is_open": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_open"], false);
    assert_eq!(open_units(&app).await.len(), 1);

    let (status, _) = book(&app, CUSTOMER, &second).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, "DELETE", &format!("/api/availability/{second}"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, _) = call(&app, "DELETE", &format!("/api/availability/{first}"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// ── Bookings ──

#[tokio::test]
async fn test_second_booking_for_same_unit_fails() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;
    let units = generate(&app, &service, "09:00", "12:00").await;
    let unit = unit_at(&units, "10:00");

    let (status, body) = book(&app, CUSTOMER, unit).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["start_time"], "10:00");
    assert_eq!(body["end_time"], "11:00");
    assert_eq!(body["price_cents"], 3500);

    let (status, body) = book(&app, OTHER_CUSTOMER, unit).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "slot_unavailable");

    let (status, _) = book(&app, PROVIDER, unit_at(&units, "11:00")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cross_service_cascade_over_http() {
    let (app, _, _) = seeded_app().await;
    let hour = create_service(&app, 60).await;
    let half = create_service(&app, 30).await;
    let hours = generate(&app, &hour, "10:00", "11:00").await;
    generate(&app, &half, "10:00", "12:00").await;
    assert_eq!(open_units(&app).await.len(), 5);

    let (status, booking) = book(&app, CUSTOMER, unit_at(&hours, "10:00")).await;
    assert_eq!(status, StatusCode::CREATED);
    let open: Vec<_> = open_units(&app)
        .await
        .iter()
        .map(|u| u["start_time"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(open, vec!["11:00", "11:30"]);

    let id = booking["id"].as_str().unwrap();
    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/bookings/{id}/reject"),
        Some(PROVIDER),
        Some(json!({"provider_notes": "away that morning"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);
    assert_eq!(body["reopened"].as_array().unwrap().len(), 3);
    assert_eq!(open_units(&app).await.len(), 5);

    let (status, body) = call(&app, "GET", &format!("/api/bookings/{id}"), Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["provider_notes"], "away that morning");
}

#[tokio::test]
async fn test_lifecycle_and_customer_cancel() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;
    let units = generate(&app, &service, "09:00", "11:00").await;

    let (_, booking) = book(&app, CUSTOMER, unit_at(&units, "09:00")).await;
    let id = booking["id"].as_str().unwrap().to_string();

    // Only the provider accepts; the customer gets 403
    let (status, _) = call(&app, "POST", &format!("/api/bookings/{id}/accept"), Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = call(&app, "POST", &format!("/api/bookings/{id}/accept"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "confirmed");

    let (status, body) = call(&app, "POST", &format!("/api/bookings/{id}/accept"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "illegal_transition");

    let (status, body) = call(&app, "GET", "/api/bookings?status=confirmed", Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (status, _) = call(&app, "GET", "/api/bookings?status=lost", Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, "POST", &format!("/api/bookings/{id}/cancel"), Some(OTHER_CUSTOMER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = call(&app, "POST", &format!("/api/bookings/{id}/cancel"), Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert_eq!(open_units(&app).await.len(), 2);

    let (status, _) = call(&app, "GET", &format!("/api/bookings/{id}"), Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_booked_service_is_refused() {
    let (app, _, _) = seeded_app().await;
    let service = create_service(&app, 60).await;
    let units = generate(&app, &service, "09:00", "10:00").await;
    book(&app, CUSTOMER, unit_at(&units, "09:00")).await;

    let (status, body) = call(&app, "DELETE", &format!("/api/services/{service}"), Some(PROVIDER), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");
}

// ── Events ──

#[tokio::test]
async fn test_lifecycle_events_reach_sink_and_channel() {
    let (app, state, events) = seeded_app().await;
    let mut rx = state.events_tx.subscribe();
    let service = create_service(&app, 60).await;
    let units = generate(&app, &service, "09:00", "10:00").await;

    let (_, booking) = book(&app, CUSTOMER, unit_at(&units, "09:00")).await;
    let id = booking["id"].as_str().unwrap().to_string();
    call(&app, "POST", &format!("/api/bookings/{id}/accept"), Some(PROVIDER), None).await;

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, BookingEventKind::Created);
    assert_eq!(first.booking_id, id);
    assert_eq!(rx.recv().await.unwrap().kind, BookingEventKind::Accepted);

    // Sink delivery runs on spawned tasks
    for _ in 0..50 {
        if events.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&BookingEventKind::Created));
    assert!(kinds.contains(&BookingEventKind::Accepted));
}

// ── Admin ──

#[tokio::test]
async fn test_split_legacy_units() {
    let (app, state, _) = seeded_app().await;
    let service = create_service(&app, 60).await;

    // A legacy unit spanning a whole morning
    {
        let db = state.db();
        db.execute(
            "INSERT INTO availability (id, provider_id, service_id, date, start_time, end_time, is_open)
             VALUES ('legacy', ?1, ?2, ?3, '09:00', '12:00', 1)",
            rusqlite::params![PROVIDER, service, DAY],
        )
        .unwrap();
    }

    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/split-units")
        .header("Authorization", format!("Bearer {ADMIN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"processed": 1, "created": 3, "deleted": 1}));

    let units = open_units(&app).await;
    assert_eq!(units.len(), 3);
    assert!(units.iter().all(|u| u["id"] != "legacy"));
}
