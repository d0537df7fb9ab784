//! User-driven study lifecycle actions: create, look up, resubmit.

use std::sync::Arc;

use radiant_core::error::CoreError;
use radiant_core::new_study::{file_ids_for_new_study, UploadedInstance};
use radiant_core::types::{StudyId, UserId};
use radiant_db::models::study::{NewStudy, Study};
use radiant_db::{ResubmitOutcome, StudyStore};

use crate::error::AppResult;
use crate::state::AppState;

/// Create a `PENDING` study from uploaded instances and hand it to the
/// worker.
///
/// If the worker cannot be told about the study, the row is discarded and
/// the whole call fails: a study nobody will process would sit in
/// `PENDING` forever. This also holds when the call is cancelled while the
/// announce is still pending.
pub async fn create_study(
    state: &AppState,
    user_id: UserId,
    instances: &[UploadedInstance],
) -> AppResult<Study> {
    let files_ids = file_ids_for_new_study(instances)?;

    let study = state
        .store
        .create(NewStudy {
            user_id,
            files_ids,
            description: String::new(),
        })
        .await?;

    let pending = UnannouncedStudy::new(state.store.clone(), study.id);

    if let Err(e) = state.publisher.announce_study(&study).await {
        tracing::warn!(study_id = %study.id, error = %e, "Announce failed, discarding new study");
        pending.disarm();
        discard_unannounced(state.store.as_ref(), study.id).await;
        return Err(e.into());
    }
    pending.disarm();

    tracing::info!(study_id = %study.id, user_id = %user_id, "Study created");
    Ok(study)
}

async fn discard_unannounced(store: &dyn StudyStore, study_id: StudyId) {
    if let Err(e) = store.discard(study_id).await {
        tracing::error!(study_id = %study_id, error = %e, "Failed to discard unannounced study");
    }
}

/// Discards a freshly inserted study when dropped, unless disarmed.
///
/// Dropping happens when the request future is abandoned mid-announce
/// (client gone, request timeout). The discard then runs on its own task.
struct UnannouncedStudy {
    store: Arc<dyn StudyStore>,
    study_id: Option<StudyId>,
}

impl UnannouncedStudy {
    fn new(store: Arc<dyn StudyStore>, study_id: StudyId) -> Self {
        Self {
            store,
            study_id: Some(study_id),
        }
    }

    fn disarm(mut self) {
        self.study_id = None;
    }
}

impl Drop for UnannouncedStudy {
    fn drop(&mut self) {
        let Some(study_id) = self.study_id.take() else {
            return;
        };

        tracing::warn!(study_id = %study_id, "Create abandoned before announce, discarding study");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                handle.spawn(async move {
                    discard_unannounced(store.as_ref(), study_id).await;
                });
            }
            Err(_) => {
                tracing::error!(study_id = %study_id, "No runtime to discard unannounced study");
            }
        }
    }
}

/// Load a study owned by `user_id`.
///
/// Studies of other users are reported as not found.
pub async fn find_owned_study(
    state: &AppState,
    user_id: UserId,
    study_id: StudyId,
) -> AppResult<Study> {
    match state.store.find_by_id(study_id).await? {
        Some(study) if study.user_id == user_id => Ok(study),
        _ => Err(CoreError::study_not_found(study_id).into()),
    }
}

/// Reset a finished or pending study to `PENDING` and send it to the
/// worker again.
///
/// Rejected while the study is `IN_PROGRESS`.
pub async fn resubmit_study(
    state: &AppState,
    user_id: UserId,
    study_id: StudyId,
) -> AppResult<Study> {
    let current = find_owned_study(state, user_id, study_id).await?;
    current.status.check_resubmit()?;

    let study = {
        let _guard = state.study_locks.lock(study_id).await;
        match state.store.reset_for_resubmission(study_id).await? {
            ResubmitOutcome::Reset(study) => study,
            ResubmitOutcome::NotFound => return Err(CoreError::study_not_found(study_id).into()),
            ResubmitOutcome::Rejected { current } => {
                current.check_resubmit()?;
                return Err(CoreError::Conflict(format!(
                    "Study cannot be resubmitted from {current}"
                ))
                .into());
            }
        }
    };

    // The study stays PENDING if this fails, so the user can simply retry.
    state.publisher.announce_study(&study).await?;

    tracing::info!(study_id = %study.id, user_id = %user_id, "Study resubmitted");
    Ok(study)
}
