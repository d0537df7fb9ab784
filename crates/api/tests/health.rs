mod common;

use axum::http::StatusCode;
use common::{build_test_app, get, send};

// ---------------------------------------------------------------------------
// Test: /health reports ok with the crate version
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let app = build_test_app();

    let (status, json) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// ---------------------------------------------------------------------------
// Test: responses carry an x-request-id header
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_request_id() {
    use tower::ServiceExt;

    let app = build_test_app();

    let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

// ---------------------------------------------------------------------------
// Test: unknown routes return 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_test_app();

    let (status, _) = send(&app, get("/api/v1/nothing-here", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
