//! Worker-reported state changes.
//!
//! [`ChangeStudyStateRequest`] is the raw JSON body the enhancement worker
//! posts. [`ChangeStudyStateRequest::validate`] turns it into a
//! [`StateChange`] that satisfies the study invariants, or rejects it
//! before anything touches storage.

use serde::Deserialize;

use crate::error::CoreError;
use crate::metadata::{RawStudyMetadata, StudyMetadata};
use crate::study_status::StudyStatus;
use crate::types::StudyId;

/// Inbound body of `POST /api/v1/studies/change_state`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStudyStateRequest {
    pub id: String,
    pub state: StudyStatus,
    #[serde(default)]
    pub failer_reason: Option<String>,
    pub result_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Option<RawStudyMetadata>,
}

/// A validated, normalized state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub study_id: StudyId,
    pub status: StudyStatus,
    /// `Some` exactly when `status` is `FAILED`.
    pub failure_reason: Option<String>,
    /// Empty unless `status` is `COMPLETED`.
    pub result_file_ids: Vec<String>,
    pub metadata: Option<StudyMetadata>,
}

impl ChangeStudyStateRequest {
    /// Decode a request body. Any shape error is a validation error.
    pub fn from_slice(body: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(body)
            .map_err(|e| CoreError::Validation(format!("Invalid state change payload: {e}")))
    }

    pub fn validate(self) -> Result<StateChange, CoreError> {
        // An id that is not even a UUID cannot reference a stored study.
        let study_id: StudyId = self
            .id
            .trim()
            .parse()
            .map_err(|_| CoreError::study_not_found(&self.id))?;

        let failure_reason = match self.state {
            StudyStatus::Failed => {
                let reason = self
                    .failer_reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        CoreError::Validation(
                            "failerReason is required when state is FAILED".into(),
                        )
                    })?;
                Some(reason)
            }
            _ => None,
        };

        if self.state != StudyStatus::Completed && !self.result_ids.is_empty() {
            return Err(CoreError::Validation(format!(
                "resultIds must be empty when state is {}",
                self.state
            )));
        }
        if self.result_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(CoreError::Validation(
                "resultIds must not contain empty ids".into(),
            ));
        }

        Ok(StateChange {
            study_id,
            status: self.state,
            failure_reason,
            result_file_ids: self.result_ids,
            metadata: self.metadata.as_ref().map(RawStudyMetadata::normalize),
        })
    }
}
