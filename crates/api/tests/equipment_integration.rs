//! Integration tests for equipment catalog and health endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    approved_equipment, create_event, create_test_app, delete, equipment_counts, get, post,
    request, send, TestUser,
};
use serde_json::json;
use uuid::Uuid;

// ============================================================================
// Listing Tests
// ============================================================================

#[tokio::test]
async fn test_vendor_lists_pending_equipment() {
    let app = create_test_app();
    let vendor = TestUser::vendor();

    let (status, body) = post(
        &app.router,
        "/api/v1/equipment",
        &vendor,
        json!({ "name": "PA system", "quantity": 3, "unit_price": "80.00" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["vendor_id"], vendor.id.to_string());
    assert_eq!(body["quantity"], 3);
    assert_eq!(body["reserved_count"], 0);
}

#[tokio::test]
async fn test_only_vendors_list_equipment() {
    let app = create_test_app();
    let (status, body) = post(
        &app.router,
        "/api/v1/equipment",
        &TestUser::user(),
        json!({ "name": "PA system", "quantity": 3, "unit_price": "80.00" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn test_listing_validation() {
    let app = create_test_app();
    let vendor = TestUser::vendor();

    let (status, _) = post(
        &app.router,
        "/api/v1/equipment",
        &vendor,
        json!({ "name": "PA system", "quantity": 3, "unit_price": "-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &app.router,
        "/api/v1/equipment",
        &vendor,
        json!({ "name": "", "quantity": 3, "unit_price": "1" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Moderation Tests
// ============================================================================

#[tokio::test]
async fn test_only_admin_changes_status() {
    let app = create_test_app();
    let vendor = TestUser::vendor();
    let (_, listed) = post(
        &app.router,
        "/api/v1/equipment",
        &vendor,
        json!({ "name": "Tent", "quantity": 2, "unit_price": "150" }),
    )
    .await;
    let uri = format!("/api/v1/equipment/{}/status", listed["id"].as_str().unwrap());

    let (status, _) = send(
        &app.router,
        request(Method::PUT, &uri, Some(&vendor), Some(json!({ "status": "approved" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app.router,
        request(
            Method::PUT,
            &uri,
            Some(&TestUser::admin()),
            Some(json!({ "status": "rejected" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");
}

#[tokio::test]
async fn test_rejecting_reserved_equipment_keeps_counts() {
    let app = create_test_app();
    let (vendor, admin, organizer) = (TestUser::vendor(), TestUser::admin(), TestUser::user());
    let chairs = approved_equipment(&app.router, &vendor, &admin, 10).await;
    create_event(&app.router, &organizer, 10, chairs, 4).await;

    let (status, _) = send(
        &app.router,
        request(
            Method::PUT,
            &format!("/api/v1/equipment/{}/status", chairs),
            Some(&admin),
            Some(json!({ "status": "rejected" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(equipment_counts(&app.router, &admin, chairs).await, (6, 4));

    // Rejected stock cannot back new events
    let (status, body) = post(
        &app.router,
        "/api/v1/events",
        &organizer,
        common::event_body(5, json!([{ "equipment_id": chairs, "quantity": 1 }])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "equipment_unavailable");
}

// ============================================================================
// Restock And Delete Tests
// ============================================================================

#[tokio::test]
async fn test_vendor_restocks_own_equipment() {
    let app = create_test_app();
    let (vendor, admin) = (TestUser::vendor(), TestUser::admin());
    let chairs = approved_equipment(&app.router, &vendor, &admin, 2).await;
    let uri = format!("/api/v1/equipment/{}/restock", chairs);

    let (status, body) = post(&app.router, &uri, &vendor, json!({ "units": 5 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["quantity"], 7);

    let (status, _) = post(&app.router, &uri, &TestUser::vendor(), json!({ "units": 5 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post(&app.router, &uri, &vendor, json!({ "units": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_equipment_in_use() {
    let app = create_test_app();
    let (vendor, admin, organizer) = (TestUser::vendor(), TestUser::admin(), TestUser::user());
    let chairs = approved_equipment(&app.router, &vendor, &admin, 10).await;
    let event_id = create_event(&app.router, &organizer, 10, chairs, 1).await;
    let uri = format!("/api/v1/equipment/{}", chairs);

    let (status, body) = delete(&app.router, &uri, &vendor).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "equipment_in_use");

    delete(&app.router, &format!("/api/v1/events/{}", event_id), &organizer).await;

    let (status, _) = delete(&app.router, &uri, &vendor).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = get(&app.router, &uri, &vendor).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_unknown_equipment() {
    let app = create_test_app();
    let (status, _) = get(
        &app.router,
        &format!("/api/v1/equipment/{}", Uuid::new_v4()),
        &TestUser::user(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Health Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoints_are_public() {
    let app = create_test_app();

    let (status, body) = send(&app.router, request(Method::GET, "/api/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&app.router, request(Method::GET, "/api/health/live", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, request(Method::GET, "/api/health/ready", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_present() {
    use tower::ServiceExt;

    let app = create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/health/live", None, None))
        .await
        .unwrap();

    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("x-request-id"));
}
