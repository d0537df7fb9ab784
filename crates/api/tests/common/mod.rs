#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use radiant_api::auth::jwt::{generate_access_token, JwtConfig};
use radiant_api::config::{BrokerBackend, ServerConfig, StoreBackend};
use radiant_api::engine::StudyLocks;
use radiant_api::router::build_app_router;
use radiant_api::state::AppState;
use radiant_api::ws::WsManager;
use radiant_broker::{MemoryChannel, StudyPublisher};
use radiant_core::study_status::TransitionPolicy;
use radiant_core::types::UserId;
use radiant_db::MemoryStudyStore;
use serde_json::Value;
use tower::ServiceExt;

/// Build a test `ServerConfig` backed by in-memory store and broker.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        database_url: None,
        broker_backend: BrokerBackend::Memory,
        broker_exchange: "studies_ex".to_string(),
        broker_connect_timeout_secs: 1,
        transition_policy: TransitionPolicy::Permissive,
        worker_token: None,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// The router plus handles on everything behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStudyStore>,
    pub channel: Arc<MemoryChannel>,
}

impl TestApp {
    /// Bearer token for `user_id`, signed with the test secret.
    pub fn token_for(&self, user_id: UserId) -> String {
        generate_access_token(user_id, &self.state.config.jwt).unwrap()
    }

    pub fn ws_manager(&self) -> &Arc<WsManager> {
        &self.state.ws_manager
    }
}

/// Build the full application router, with the same middleware stack as
/// `main.rs`, over the in-memory store and broker channel.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStudyStore::default());
    let channel = Arc::new(MemoryChannel::new(config.broker_exchange.clone()));

    let state = AppState {
        store: store.clone(),
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
        publisher: StudyPublisher::new(channel.clone()),
        study_locks: Arc::new(StudyLocks::new()),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        store,
        channel,
    }
}

/// Send a request through the router and return status + parsed JSON body
/// (`Value::Null` for an empty body).
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    post_raw(uri, body.to_string(), token)
}

pub fn post_raw(uri: &str, body: impl Into<String>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.into())).unwrap()
}

/// Upload descriptors for the given instance ids.
pub fn instances(ids: &[&str]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| {
                serde_json::json!({
                    "ID": id,
                    "ParentPatient": "patient-1",
                    "ParentSeries": "series-1",
                    "ParentStudy": "study-1",
                })
            })
            .collect(),
    )
}

/// Create a study as `user_id` through the API; returns the `data` object.
pub async fn create_study(app: &TestApp, user_id: UserId, ids: &[&str]) -> Value {
    let token = app.token_for(user_id);
    let (status, json) = send(
        app,
        post_json("/api/v1/studies", &instances(ids), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
    json["data"].clone()
}

/// Post a worker state change.
pub async fn change_state(app: &TestApp, body: Value) -> (StatusCode, Value) {
    send(app, post_json("/api/v1/studies/change_state", &body, None)).await
}
