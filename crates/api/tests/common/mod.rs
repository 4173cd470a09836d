//! Common test utilities for integration tests.
//!
//! The router runs against the in-memory reservation store, so these tests
//! need no database. Postgres behaviour is covered by the persistence crate's
//! ignored integration tests.

// Helpers are shared across test binaries; not every binary uses all of them.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use domain::services::{InMemoryReservationStore, MockNotificationDispatcher};
use event_rental_api::{app::create_app, config::Config};
use serde_json::{json, Value};
use shared::jwt::{JwtConfig, Role};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_SECRET: &str = "test-shared-secret-for-event-rental";

/// Test configuration with the shared HS256 secret and jobs disabled.
pub fn test_config() -> Config {
    Config::load_for_test(&[("database.url", "postgres://unused@localhost/unused")])
        .expect("Failed to load test config")
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryReservationStore,
    pub notifier: MockNotificationDispatcher,
}

pub fn create_test_app() -> TestApp {
    let store = InMemoryReservationStore::new();
    let notifier = MockNotificationDispatcher::new();
    let router = create_app(
        test_config(),
        Arc::new(store.clone()),
        Arc::new(notifier.clone()),
    )
    .expect("Failed to build app");

    TestApp {
        router,
        store,
        notifier,
    }
}

/// A caller with a freshly minted bearer token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub token: String,
}

impl TestUser {
    pub fn new(role: Role) -> Self {
        let id = Uuid::new_v4();
        let jwt = JwtConfig::from_secret(TEST_SECRET, 0).expect("Failed to build JWT config");
        let (token, _) = jwt
            .issue_token(id, role, 3600)
            .expect("Failed to issue token");
        Self { id, token }
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn vendor() -> Self {
        Self::new(Role::Vendor)
    }

    pub fn admin() -> Self {
        Self::new(Role::Admin)
    }
}

pub fn request(method: Method, uri: &str, user: Option<&TestUser>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", user.token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Sends a request and returns the status with the parsed JSON body
/// (`Value::Null` for empty bodies).
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, body)
}

pub async fn get(app: &Router, uri: &str, user: &TestUser) -> (StatusCode, Value) {
    send(app, request(Method::GET, uri, Some(user), None)).await
}

pub async fn post(app: &Router, uri: &str, user: &TestUser, body: Value) -> (StatusCode, Value) {
    send(app, request(Method::POST, uri, Some(user), Some(body))).await
}

pub async fn delete(app: &Router, uri: &str, user: &TestUser) -> (StatusCode, Value) {
    send(app, request(Method::DELETE, uri, Some(user), None)).await
}

/// Lists equipment as `vendor` and has `admin` approve it. Returns its id.
pub async fn approved_equipment(
    app: &Router,
    vendor: &TestUser,
    admin: &TestUser,
    quantity: i32,
) -> Uuid {
    let (status, body) = post(
        app,
        "/api/v1/equipment",
        vendor,
        json!({
            "name": "Folding chair",
            "description": "Stackable",
            "quantity": quantity,
            "unit_price": "12.50"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create equipment: {}", body);
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();

    let (status, body) = send(
        app,
        request(
            Method::PUT,
            &format!("/api/v1/equipment/{}/status", id),
            Some(admin),
            Some(json!({ "status": "approved" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "approve equipment: {}", body);
    id
}

pub fn event_body(capacity: i32, equipment: Value) -> Value {
    json!({
        "name": "Summer fair",
        "description": "Outdoor",
        "location": "Riverside park",
        "starts_at": "2030-06-01T10:00:00Z",
        "capacity": capacity,
        "waitlist_enabled": true,
        "equipment": equipment
    })
}

/// Creates an event owned by `organizer` holding `quantity` units of `equipment_id`.
pub async fn create_event(
    app: &Router,
    organizer: &TestUser,
    capacity: i32,
    equipment_id: Uuid,
    quantity: i32,
) -> Uuid {
    let (status, body) = post(
        app,
        "/api/v1/events",
        organizer,
        event_body(
            capacity,
            json!([{ "equipment_id": equipment_id, "quantity": quantity }]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create event: {}", body);
    body["id"].as_str().unwrap().parse().unwrap()
}

pub async fn equipment_counts(app: &Router, user: &TestUser, equipment_id: Uuid) -> (i64, i64) {
    let (status, body) = get(app, &format!("/api/v1/equipment/{}", equipment_id), user).await;
    assert_eq!(status, StatusCode::OK);
    (
        body["quantity"].as_i64().unwrap(),
        body["reserved_count"].as_i64().unwrap(),
    )
}
