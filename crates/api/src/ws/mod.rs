//! Real-time fan-out hub.
//!
//! Viewers open a WebSocket, join the room of the study they are looking
//! at, and receive `study_state_change` events for it.

mod handler;
mod heartbeat;
pub mod manager;
pub mod protocol;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
