//! Router tests that never reach the database.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::Value;

use waladaw_integration_tests::{form_post, get, offline_app, send};

#[tokio::test]
async fn test_liveness() {
    let resp = send(offline_app(), get("/health")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");
}

#[tokio::test]
async fn test_readiness_reports_missing_database() {
    let resp = send(offline_app(), get("/health/ready")).await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_login_page_renders_with_security_headers() {
    let resp = send(offline_app(), get("/auth/login")).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("<h1>Log in</h1>"));

    assert_eq!(resp.headers["x-frame-options"], "DENY");
    assert_eq!(resp.headers["x-content-type-options"], "nosniff");
    let csp = resp.headers["content-security-policy"].to_str().unwrap();
    assert!(csp.contains("frame-ancestors 'none'"));
    assert!(resp.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let request = axum::http::Request::get("/health")
        .header("x-request-id", "edge-1234")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(offline_app(), request).await;
    assert_eq!(resp.headers["x-request-id"], "edge-1234");
}

#[tokio::test]
async fn test_malformed_email_is_refused_without_lookup() {
    let resp = send(
        offline_app(),
        form_post("/auth/login", "email=not-an-email&password=whatever123"),
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.body.contains("Invalid email or password"));
    assert!(resp.body.contains("value=\"not-an-email\""));
    assert!(!resp.body.contains("whatever123"));
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let resp = send(
        offline_app(),
        form_post(
            "/auth/register",
            "email=ana%40mail.com&display_name=Ana&password=correct-horse&password_confirm=battery-staple",
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body.contains("Passwords do not match"));
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let resp = send(
        offline_app(),
        form_post(
            "/auth/register",
            "email=ana%40mail.com&display_name=Ana&password=short&password_confirm=short",
        ),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.body.contains("at least 8 characters"));
}

#[tokio::test]
async fn test_pages_redirect_anonymous_visitors_to_login() {
    for path in ["/cart", "/checkout", "/purchases", "/account", "/products/new", "/admin"] {
        let resp = send(offline_app(), get(path)).await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER, "{path}");
        assert_eq!(resp.location(), Some("/auth/login"), "{path}");
    }
}

#[tokio::test]
async fn test_api_answers_anonymous_callers_with_json() {
    let request = axum::http::Request::post("/api/favorites/1")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = send(offline_app(), request).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let body: Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let resp = send(offline_app(), get("/no-such-page")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.body.contains("Page not found"));
}
