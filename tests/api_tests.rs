// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP surface: authentication, admin gating, request validation and the
//! main member flows end to end.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{token_for, TestApp};

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/api/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_unknown_token() {
    let app = TestApp::new();
    let (status, body) = app
        .request(Method::GET, "/api/me", Some("forged"), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_login_returns_profile() {
    let app = TestApp::new();
    let token = app.identity.register("ana@example.com", "Ana");

    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "id_token": token })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@example.com");
    assert_eq!(body["user"]["provider"], "GOOGLE");
    assert_eq!(body["user"]["credits"], 0);
    assert_eq!(body["needs_profile"], true);
}

#[tokio::test]
async fn test_login_rejects_empty_token() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "id_token": "" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_str()
        .unwrap()
        .contains("id_token is required"));
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = TestApp::new();
    app.member("ana@example.com", "Ana").await;
    let token = token_for("ana@example.com");

    let (status, _) = app
        .request(Method::GET, "/admin/users", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.request(Method::GET, "/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.admin("boss@example.com", "Boss").await;
    let (status, body) = app
        .request(
            Method::GET,
            "/admin/users",
            Some(&token_for("boss@example.com")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_book_and_cancel_over_http() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;
    app.grant(ana.id, 2).await;
    let class = app.class_in_hours(24, 8).await;
    let token = token_for("ana@example.com");

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/gym-classes/{}/book", class.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["remaining_credits"], 1);
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(Method::GET, "/api/gym-classes", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], class.id.to_string());
    assert_eq!(body[0]["booked_slots"], 1);
    assert_eq!(body[0]["available_slots"], 7);
    assert_eq!(body[0]["is_booked"], true);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/gym-classes/{}/book", class.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/bookings/{booking_id}/cancel"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refunded"], true);
    assert_eq!(body["booking"]["status"], "cancelled");

    let (status, body) = app
        .request(Method::GET, "/api/my-bookings", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["can_cancel"], false);
}

#[tokio::test]
async fn test_rejection_reasons_have_distinct_codes() {
    let app = TestApp::new();
    app.member("ana@example.com", "Ana").await;
    let class = app.class_in_hours(24, 8).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/gym-classes/{}/book", class.id),
            Some(&token_for("ana@example.com")),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_credits");
}

#[tokio::test]
async fn test_list_classes_by_studio_date() {
    let app = TestApp::new();
    app.member("ana@example.com", "Ana").await;
    // 23:30 local on May 4 is already May 5 in UTC.
    let late = app
        .class_at("2026-05-05T02:30:00Z".parse().unwrap(), 8)
        .await;
    app.class_at("2026-05-05T12:00:00Z".parse().unwrap(), 8)
        .await;

    let (status, body) = app
        .request(
            Method::GET,
            "/api/gym-classes?date=2026-05-04",
            Some(&token_for("ana@example.com")),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let classes = body.as_array().unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0]["id"], late.id.to_string());
}

#[tokio::test]
async fn test_profile_patch_validation() {
    let app = TestApp::new();
    app.member("ana@example.com", "Ana").await;
    let token = token_for("ana@example.com");

    let (status, _) = app
        .request(
            Method::PATCH,
            "/api/me",
            Some(&token),
            Some(json!({ "full_name": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::PATCH,
            "/api/me",
            Some(&token),
            Some(json!({ "dni": " 28999111 ", "phone": "555-0101" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["dni"], "28999111");
    assert!(body["merged"].is_null());
}

#[tokio::test]
async fn test_admin_creates_recurring_class_and_fixed_schedule() {
    let app = TestApp::new();
    app.admin("boss@example.com", "Boss").await;
    let token = token_for("boss@example.com");

    let (status, body) = app
        .request(
            Method::POST,
            "/admin/fixed-schedules",
            Some(&token),
            Some(json!({
                "dni": "30111222",
                "full_name": "Carla Gómez",
                "day_of_week": "monday",
                "start_time": "18:00"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_created"], true);
    assert_eq!(body["schedule"]["start_time"], "18:00");

    let (status, body) = app
        .request(
            Method::POST,
            "/admin/gym-classes",
            Some(&token),
            Some(json!({
                "instructor": "Laura",
                "start_time": "2026-05-04T21:00:00Z",
                "max_slots": 6,
                "is_recurring": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["classes"].as_array().unwrap().len(), 12);
    assert_eq!(body["bookings_created"], 11);
    assert_eq!(body["holiday_credits"], 1);

    let class_id = body["classes"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/admin/gym-classes/{class_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attendees"][0]["full_name"], "Carla Gómez");
}

#[tokio::test]
async fn test_admin_class_validation() {
    let app = TestApp::new();
    app.admin("boss@example.com", "Boss").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/admin/gym-classes",
            Some(&token_for("boss@example.com")),
            Some(json!({
                "instructor": "Laura",
                "start_time": "2026-05-04T21:00:00Z",
                "max_slots": 0
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("max_slots"));
}

#[tokio::test]
async fn test_admin_credits_and_toggles() {
    let app = TestApp::new();
    app.admin("boss@example.com", "Boss").await;
    let ana = app.member("ana@example.com", "Ana").await;
    let token = token_for("boss@example.com");

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/admin/users/{}/credits", ana.id),
            Some(&token),
            Some(json!({ "amount": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], 8);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/admin/users/{}/credits", ana.id),
            Some(&token),
            Some(json!({ "amount": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/admin/users/{}/toggle-trial", ana.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_trial"], true);

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/admin/users/{}", ana.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["credits"], 8);
    assert_eq!(body["credits"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_settings_are_public_and_admin_writable() {
    let app = TestApp::new();
    app.admin("boss@example.com", "Boss").await;

    let (status, body) = app
        .request(
            Method::PATCH,
            "/admin/settings/pause_reservations",
            Some(&token_for("boss@example.com")),
            Some(json!({ "value": "true" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "true");

    let (status, body) = app.request(Method::GET, "/settings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pause_reservations"], "true");
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_certificate_upload_uses_content_type() {
    let app = TestApp::new();
    app.member("ana@example.com", "Ana").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/me/medical-certificate")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", token_for("ana@example.com")),
                )
                .header(header::CONTENT_TYPE, "image/png")
                .body(Body::from(vec![0x89, b'P', b'N', b'G']))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stored = app.media.stored.lock().unwrap();
    assert_eq!(stored[0].1, "png");
    assert_eq!(stored[0].2, 4);
}

#[tokio::test]
async fn test_admin_class_update_keeps_start_time() {
    let app = TestApp::new();
    app.admin("boss@example.com", "Boss").await;
    let class = app.class_in_hours(24, 8).await;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/admin/gym-classes/{}", class.id),
            Some(&token_for("boss@example.com")),
            Some(json!({
                "name": "Mat",
                "start_time": "2026-06-01T21:00:00Z"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Mat");

    let stored = app.state.db.get_class(class.id).await.unwrap().unwrap();
    assert_eq!(stored.start_time, class.start_time);
    assert_eq!(stored.name, "Mat");
}

#[tokio::test]
async fn test_profile_dni_with_punctuation_is_rejected() {
    let app = TestApp::new();
    let ana = app.member("ana@example.com", "Ana").await;

    let (status, _) = app
        .request(
            Method::PATCH,
            "/api/me",
            Some(&token_for("ana@example.com")),
            Some(json!({ "dni": "28.999.111" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let stored = app.state.db.get_user(ana.id).await.unwrap().unwrap();
    assert!(stored.dni.is_none());
}
