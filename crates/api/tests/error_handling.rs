//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use radiant_api::error::AppError;
use radiant_broker::BrokerError;
use radiant_core::error::CoreError;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::NotFound maps to 404 with NOT_FOUND code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::study_not_found("abc"));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Study with id abc not found");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Validation maps to 400 with VALIDATION_ERROR code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("failerReason is required".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "failerReason is required");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Precondition maps to 409 with PRECONDITION_FAILED code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn precondition_error_returns_409() {
    let err = AppError::Core(CoreError::Precondition(
        "Please wait until the study is completed".into(),
    ));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "PRECONDITION_FAILED");
    assert_eq!(json["error"], "Please wait until the study is completed");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Conflict maps to 409 with CONFLICT code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflict_error_returns_409() {
    let err = AppError::Core(CoreError::Conflict("Study cannot move from COMPLETED to PENDING".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Test: broker outages map to 503 with a retry hint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broker_unavailable_returns_503() {
    for err in [
        BrokerError::Connection("connection refused".into()),
        BrokerError::Publish("channel closed".into()),
    ] {
        let (status, json) = error_to_response(AppError::Broker(err)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["code"], "BROKER_UNAVAILABLE");
        let message = json["error"].as_str().unwrap();
        assert!(message.contains("try again"));
        assert!(!message.contains("refused"), "broker details must not leak");
    }
}

// ---------------------------------------------------------------------------
// Test: other broker failures are sanitized 500s
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broker_queue_error_returns_500() {
    let err = AppError::Broker(BrokerError::Queue("bind failed on studies_ex".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: AppError::InternalError maps to 500 and sanitizes the message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("secret database credentials leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: sqlx RowNotFound maps to 404; other database errors to 500
// ---------------------------------------------------------------------------

#[tokio::test]
async fn database_errors_are_classified() {
    let (status, json) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");

    let (status, json) = error_to_response(AppError::Database(sqlx::Error::PoolTimedOut)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: unauthorized keeps its message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthorized_maps_to_401() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Unauthorized("Missing worker token".into())))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Missing worker token");
    assert_eq!(json["code"], "UNAUTHORIZED");
}
