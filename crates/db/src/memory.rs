//! In-process [`StudyStore`] for local runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use radiant_core::study_state::StateChange;
use radiant_core::study_status::{StudyStatus, TransitionPolicy};
use radiant_core::types::StudyId;
use tokio::sync::RwLock;

use crate::models::study::{NewStudy, Study};
use crate::store::{ResubmitOutcome, StateChangeOutcome, StudyStore};

/// A [`StudyStore`] backed by a `HashMap` behind a single `RwLock`.
///
/// Mutations hold the write lock for their whole read-check-write, which
/// gives the same atomicity as the row lock in the PostgreSQL store.
#[derive(Default)]
pub struct MemoryStudyStore {
    studies: RwLock<HashMap<StudyId, Study>>,
}

impl MemoryStudyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.studies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.studies.read().await.is_empty()
    }
}

#[async_trait]
impl StudyStore for MemoryStudyStore {
    async fn create(&self, input: NewStudy) -> Result<Study, sqlx::Error> {
        let study = Study::new_pending(input);
        self.studies.write().await.insert(study.id, study.clone());
        Ok(study)
    }

    async fn find_by_id(&self, id: StudyId) -> Result<Option<Study>, sqlx::Error> {
        Ok(self.studies.read().await.get(&id).cloned())
    }

    async fn apply_state_change(
        &self,
        change: &StateChange,
        policy: TransitionPolicy,
    ) -> Result<StateChangeOutcome, sqlx::Error> {
        let mut studies = self.studies.write().await;
        let Some(study) = studies.get_mut(&change.study_id) else {
            return Ok(StateChangeOutcome::NotFound);
        };

        if !policy.permits(study.status, change.status) {
            return Ok(StateChangeOutcome::Rejected {
                current: study.status,
            });
        }

        study.status = change.status;
        study.failure_reason = change.failure_reason.clone();
        study.result_file_ids = change.result_file_ids.clone();
        if let Some(metadata) = &change.metadata {
            study.metadata = Some(metadata.clone());
        }
        study.updated_at = chrono::Utc::now();

        Ok(StateChangeOutcome::Applied(study.clone()))
    }

    async fn reset_for_resubmission(&self, id: StudyId) -> Result<ResubmitOutcome, sqlx::Error> {
        let mut studies = self.studies.write().await;
        let Some(study) = studies.get_mut(&id) else {
            return Ok(ResubmitOutcome::NotFound);
        };

        if !study.status.can_resubmit() {
            return Ok(ResubmitOutcome::Rejected {
                current: study.status,
            });
        }

        study.status = StudyStatus::Pending;
        study.result_file_ids.clear();
        study.failure_reason = None;
        study.metadata = None;
        study.updated_at = chrono::Utc::now();

        Ok(ResubmitOutcome::Reset(study.clone()))
    }

    async fn discard(&self, id: StudyId) -> Result<bool, sqlx::Error> {
        Ok(self.studies.write().await.remove(&id).is_some())
    }

    async fn health_check(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use radiant_core::metadata::StudyMetadata;

    fn new_study() -> NewStudy {
        NewStudy {
            user_id: uuid::Uuid::new_v4(),
            files_ids: vec!["f1".into(), "f2".into()],
            description: String::new(),
        }
    }

    fn change(id: StudyId, status: StudyStatus) -> StateChange {
        StateChange {
            study_id: id,
            status,
            failure_reason: None,
            result_file_ids: Vec::new(),
            metadata: None,
        }
    }

    fn metadata() -> StudyMetadata {
        StudyMetadata {
            patient_name: "N/A".into(),
            patient_id: "Patient ID: 1".into(),
            patient_birth_date: "Birth Date: 1980-01-01".into(),
            patient_sex: "Sex: Male".into(),
            study_description: "Study Description: Head".into(),
            study_date: "Study Date: 2024-01-01".into(),
            modality: "Modality: CT".into(),
        }
    }

    #[tokio::test]
    async fn create_starts_pending_with_no_results() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();

        assert_eq!(study.status, StudyStatus::Pending);
        assert_eq!(study.files_ids, vec!["f1", "f2"]);
        assert!(study.result_file_ids.is_empty());
        assert_eq!(store.find_by_id(study.id).await.unwrap(), Some(study));
    }

    #[tokio::test]
    async fn apply_writes_all_fields() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();

        let mut completed = change(study.id, StudyStatus::Completed);
        completed.result_file_ids = vec!["r1".into()];
        completed.metadata = Some(metadata());

        let outcome = store
            .apply_state_change(&completed, TransitionPolicy::Permissive)
            .await
            .unwrap();

        let updated = assert_matches!(outcome, StateChangeOutcome::Applied(s) => s);
        assert_eq!(updated.status, StudyStatus::Completed);
        assert_eq!(updated.result_file_ids, vec!["r1"]);
        assert_eq!(updated.metadata, Some(metadata()));
    }

    #[tokio::test]
    async fn apply_keeps_metadata_when_change_has_none() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();

        let mut with_meta = change(study.id, StudyStatus::InProgress);
        with_meta.metadata = Some(metadata());
        store
            .apply_state_change(&with_meta, TransitionPolicy::Permissive)
            .await
            .unwrap();

        store
            .apply_state_change(&change(study.id, StudyStatus::InProgress), TransitionPolicy::Permissive)
            .await
            .unwrap();

        let stored = store.find_by_id(study.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata, Some(metadata()));
    }

    #[tokio::test]
    async fn apply_unknown_study_is_not_found() {
        let store = MemoryStudyStore::new();
        let outcome = store
            .apply_state_change(
                &change(uuid::Uuid::new_v4(), StudyStatus::InProgress),
                TransitionPolicy::Permissive,
            )
            .await
            .unwrap();

        assert_eq!(outcome, StateChangeOutcome::NotFound);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn forward_policy_rejection_leaves_study_untouched() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();

        let outcome = store
            .apply_state_change(&change(study.id, StudyStatus::Completed), TransitionPolicy::Forward)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            StateChangeOutcome::Rejected {
                current: StudyStatus::Pending
            }
        );
        assert_eq!(store.find_by_id(study.id).await.unwrap(), Some(study));
    }

    #[tokio::test]
    async fn resubmission_clears_results_and_failure() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();

        let mut failed = change(study.id, StudyStatus::Failed);
        failed.failure_reason = Some("bad input".into());
        store
            .apply_state_change(&failed, TransitionPolicy::Permissive)
            .await
            .unwrap();

        let outcome = store.reset_for_resubmission(study.id).await.unwrap();
        let reset = assert_matches!(outcome, ResubmitOutcome::Reset(s) => s);

        assert_eq!(reset.status, StudyStatus::Pending);
        assert!(reset.failure_reason.is_none());
        assert!(reset.result_file_ids.is_empty());
        assert_eq!(reset.files_ids, vec!["f1", "f2"]);
    }

    #[tokio::test]
    async fn resubmission_rejected_while_in_progress() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();
        store
            .apply_state_change(&change(study.id, StudyStatus::InProgress), TransitionPolicy::Permissive)
            .await
            .unwrap();

        let outcome = store.reset_for_resubmission(study.id).await.unwrap();
        assert_eq!(
            outcome,
            ResubmitOutcome::Rejected {
                current: StudyStatus::InProgress
            }
        );
    }

    #[tokio::test]
    async fn discard_removes_row() {
        let store = MemoryStudyStore::new();
        let study = store.create(new_study()).await.unwrap();

        assert!(store.discard(study.id).await.unwrap());
        assert!(!store.discard(study.id).await.unwrap());
        assert_eq!(store.len().await, 0);
    }
}
