mod common;

use axum::http::StatusCode;
use common::TestPortal;

#[tokio::test]
async fn health_check_works() {
    let portal = TestPortal::spawn().await;

    let (status, body) = portal.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn metrics_endpoint_answers() {
    let portal = TestPortal::spawn().await;

    let (status, _) = portal.get("/metrics").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_routes_require_a_session() {
    let portal = TestPortal::spawn().await;

    for uri in ["/api/library", "/api/dashboard", "/api/upload", "/api/users"] {
        let (status, body) = portal.get(uri).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["details"], "login_required", "{}", uri);
    }
}

#[tokio::test]
async fn session_reports_signed_out() {
    let portal = TestPortal::spawn().await;

    let (status, body) = portal.get("/session").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);
}
