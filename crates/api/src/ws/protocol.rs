//! JSON envelopes exchanged over the study WebSocket.
//!
//! Every text frame is `{ "event": <name>, "data": <payload> }`.

use axum::extract::ws::Message;
use radiant_core::metadata::StudyMetadata;
use radiant_core::study_status::StudyStatus;
use radiant_core::types::StudyId;
use radiant_db::models::study::Study;
use serde::{Deserialize, Serialize};

/// Commands a viewer may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Start receiving events for a study.
    JoinStudy(String),
    /// Stop receiving events for a study.
    LeaveStudy(String),
}

/// Events pushed to viewers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    StudyStateChange(StudyStateChanged),
}

/// Payload of `study_state_change`.
///
/// `state == "COMPLETED"` is the only terminal-success value; viewers
/// reload on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyStateChanged {
    pub id: StudyId,
    pub state: StudyStatus,
    pub failer_reason: Option<String>,
    pub result_ids: Vec<String>,
    pub metadata: Option<StudyMetadata>,
}

impl From<&Study> for StudyStateChanged {
    fn from(study: &Study) -> Self {
        Self {
            id: study.id,
            state: study.status,
            failer_reason: study.failure_reason.clone(),
            result_ids: study.result_file_ids.clone(),
            metadata: study.metadata.clone(),
        }
    }
}

impl ServerEvent {
    pub fn to_message(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// Canonical room name for a client-supplied study id.
///
/// UUIDs are normalised to their lowercase hyphenated form so a viewer
/// joining with any spelling lands in the room the server broadcasts to.
pub fn room_for(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<StudyId>() {
        Ok(id) => id.to_string(),
        Err(_) => trimmed.to_string(),
    }
}
