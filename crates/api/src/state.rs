use std::sync::Arc;

use radiant_broker::StudyPublisher;
use radiant_db::StudyStore;

use crate::config::ServerConfig;
use crate::engine::StudyLocks;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Study persistence (PostgreSQL or in-memory).
    pub store: Arc<dyn StudyStore>,
    pub config: Arc<ServerConfig>,
    /// WebSocket connections and study rooms.
    pub ws_manager: Arc<WsManager>,
    /// Publishes study commands to the enhancement worker.
    pub publisher: StudyPublisher,
    /// Serializes mutations of a single study within this process.
    pub study_locks: Arc<StudyLocks>,
}
