use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use radiant_broker::{AmqpChannel, MemoryChannel, MessageChannel, StudyPublisher};
use radiant_db::models::configs::Configs;
use radiant_db::{MemoryStudyStore, PgStudyStore, StudyStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radiant_api::config::{BrokerBackend, ServerConfig, StoreBackend};
use radiant_api::engine::StudyLocks;
use radiant_api::router::build_app_router;
use radiant_api::state::AppState;
use radiant_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store = ?config.store_backend,
        broker = ?config.broker_backend,
        policy = ?config.transition_policy,
        "Loaded server configuration"
    );

    // --- Study store ---
    let (store, configs): (Arc<dyn StudyStore>, Configs) = match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");

            let pool = radiant_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            radiant_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            radiant_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let configs = radiant_db::repositories::ConfigsRepo::load(&pool)
                .await
                .expect("Failed to load configs");

            (Arc::new(PgStudyStore::new(pool)), configs)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory study store; studies are lost on restart");
            (Arc::new(MemoryStudyStore::default()), Configs::defaults())
        }
    };

    // --- Message broker ---
    let channel: Arc<dyn MessageChannel> = match config.broker_backend {
        BrokerBackend::Amqp => {
            let broker_config = config
                .broker_config(&configs)
                .unwrap_or_else(|e| panic!("Invalid broker configuration: {e}"));
            tracing::info!(broker = ?broker_config, "Broker configured");

            let channel = AmqpChannel::new(broker_config);
            // Connecting eagerly only surfaces problems early; publishing
            // reconnects on demand either way.
            if let Err(e) = channel.ensure_channel().await {
                tracing::warn!(error = %e, "Broker not reachable at startup");
            }
            Arc::new(channel)
        }
        BrokerBackend::Memory => {
            tracing::warn!("Using in-memory broker; no study reaches a worker");
            Arc::new(MemoryChannel::new(config.broker_exchange.clone()))
        }
    };
    let publisher = StudyPublisher::new(Arc::clone(&channel));

    // --- WebSocket manager + heartbeat ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), heartbeat_cancel.clone());

    // --- App state ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        publisher,
        study_locks: Arc::new(StudyLocks::new()),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let cleanup = async {
        let ws_count = ws_manager.connection_count().await;
        tracing::info!(ws_count, "Closing remaining WebSocket connections");
        ws_manager.shutdown_all().await;

        heartbeat_cancel.cancel();
        let _ = heartbeat_handle.await;
        tracing::info!("Heartbeat task stopped");

        channel.close().await;
    };

    if tokio::time::timeout(Duration::from_secs(config.shutdown_timeout_secs), cleanup)
        .await
        .is_err()
    {
        tracing::warn!("Cleanup did not finish within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// `LOG_FORMAT=json` switches to JSON lines; anything else is human-readable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "radiant_api=debug,radiant_broker=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
