//! Study entity and creation DTO.

use radiant_core::metadata::StudyMetadata;
use radiant_core::study_status::StudyStatus;
use radiant_core::types::{StudyId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A study as stored and as published to the enhancement worker.
///
/// The serialized field names (`filesIds`, `failerReason`, ...) are the
/// ones the worker and dashboard already consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: StudyId,
    pub user_id: UserId,
    pub files_ids: Vec<String>,
    pub result_file_ids: Vec<String>,
    pub status: StudyStatus,
    #[serde(rename = "failerReason")]
    pub failure_reason: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StudyMetadata>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Study {
    /// Build a fresh `PENDING` study. Used by stores that assign ids
    /// themselves.
    pub fn new_pending(input: NewStudy) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::now_v7(),
            user_id: input.user_id,
            files_ids: input.files_ids,
            result_file_ids: Vec::new(),
            status: StudyStatus::INITIAL,
            failure_reason: None,
            description: input.description,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// DTO for creating a study.
#[derive(Debug, Clone)]
pub struct NewStudy {
    pub user_id: UserId,
    pub files_ids: Vec<String>,
    pub description: String,
}

/// Raw `studies` row; `status` is decoded separately.
#[derive(Debug, FromRow)]
pub(crate) struct StudyRow {
    pub id: StudyId,
    pub user_id: UserId,
    pub files_ids: Vec<String>,
    pub result_file_ids: Vec<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub description: String,
    pub metadata: Option<Json<StudyMetadata>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<StudyRow> for Study {
    type Error = sqlx::Error;

    fn try_from(row: StudyRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<StudyStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Study {
            id: row.id,
            user_id: row.user_id,
            files_ids: row.files_ids,
            result_file_ids: row.result_file_ids,
            status,
            failure_reason: row.failure_reason,
            description: row.description,
            metadata: row.metadata.map(|m| m.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
