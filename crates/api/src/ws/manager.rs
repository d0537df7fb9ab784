use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use radiant_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Rooms this connection has joined.
    pub rooms: HashSet<String>,
    pub connected_at: Timestamp,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<String, WsConnection>,
    /// room -> member connection ids
    rooms: HashMap<String, HashSet<String>>,
}

impl Registry {
    /// Drop a connection and every room membership it holds.
    fn evict(&mut self, conn_id: &str) -> Option<WsConnection> {
        let conn = self.connections.remove(conn_id)?;
        for room in &conn.rooms {
            self.leave_room(room, conn_id);
        }
        Some(conn)
    }

    fn leave_room(&mut self, room: &str, conn_id: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(conn_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// Manages all active WebSocket connections and their study rooms.
///
/// Connections and room memberships live behind one `RwLock` so a join,
/// leave or disconnect is never observed half-applied by a broadcast.
/// Designed to be wrapped in `Arc` and shared across the application.
pub struct WsManager {
    registry: RwLock<Registry>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink. Re-using an id replaces the
    /// previous connection and drops its memberships.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            rooms: HashSet::new(),
            connected_at: chrono::Utc::now(),
        };

        let mut registry = self.registry.write().await;
        registry.evict(&conn_id);
        registry.connections.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID, leaving every room it was in.
    pub async fn remove(&self, conn_id: &str) {
        if let Some(conn) = self.registry.write().await.evict(conn_id) {
            let open_for = chrono::Utc::now() - conn.connected_at;
            tracing::debug!(
                conn_id,
                rooms = conn.rooms.len(),
                open_secs = open_for.num_seconds(),
                "Connection removed from hub"
            );
        }
    }

    /// Add a connection to a room. Returns `false` for unknown connections.
    pub async fn join(&self, conn_id: &str, room: &str) -> bool {
        let mut registry = self.registry.write().await;
        let Some(conn) = registry.connections.get_mut(conn_id) else {
            return false;
        };
        conn.rooms.insert(room.to_string());
        registry
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// Remove a connection from a room. Returns `false` if it was not a member.
    pub async fn leave(&self, conn_id: &str, room: &str) -> bool {
        let mut registry = self.registry.write().await;
        let was_member = registry
            .connections
            .get_mut(conn_id)
            .is_some_and(|conn| conn.rooms.remove(room));
        if was_member {
            registry.leave_room(room, conn_id);
        }
        was_member
    }

    /// Deliver a message to every member of a room.
    ///
    /// Delivery is best-effort. Members whose send channel has closed are
    /// pruned from the hub. Returns the number of connections the message
    /// was handed to; an empty or unknown room yields `0`.
    pub async fn broadcast_to_room(&self, room: &str, message: Message) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        {
            let registry = self.registry.read().await;
            let Some(members) = registry.rooms.get(room) else {
                return 0;
            };
            for conn_id in members {
                match registry.connections.get(conn_id) {
                    Some(conn) if conn.sender.send(message.clone()).is_ok() => delivered += 1,
                    _ => dead.push(conn_id.clone()),
                }
            }
        }

        if !dead.is_empty() {
            let mut registry = self.registry.write().await;
            for conn_id in &dead {
                registry.evict(conn_id);
                registry.leave_room(room, conn_id);
            }
            tracing::debug!(room, pruned = dead.len(), "Pruned closed connections");
        }

        delivered
    }

    /// Number of connections currently in a room.
    pub async fn room_size(&self, room: &str) -> usize {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .map_or(0, HashSet::len)
    }

    /// Rooms a connection is currently a member of.
    pub async fn rooms_of(&self, conn_id: &str) -> Vec<String> {
        self.registry
            .read()
            .await
            .connections
            .get(conn_id)
            .map(|conn| conn.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Send a Close frame to every connection, then clear all state.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut registry = self.registry.write().await;
        let count = registry.connections.len();
        for conn in registry.connections.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        registry.connections.clear();
        registry.rooms.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let registry = self.registry.read().await;
        for conn in registry.connections.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
