//! Worker state-change ingest.
//!
//! Persists a validated [`StateChange`] and then notifies the study's room.
//! Both steps run under the study's lock so two callbacks for one study
//! cannot interleave their writes and broadcasts.

use radiant_core::error::CoreError;
use radiant_core::study_state::StateChange;
use radiant_db::models::study::Study;
use radiant_db::StateChangeOutcome;

use crate::error::AppResult;
use crate::state::AppState;
use crate::ws::protocol::{ServerEvent, StudyStateChanged};
use crate::ws::WsManager;

/// Apply a worker-reported state change and broadcast it.
///
/// Nothing is broadcast unless the write succeeded. An empty room is not
/// an error.
pub async fn apply_state_change(state: &AppState, change: StateChange) -> AppResult<Study> {
    let policy = state.config.transition_policy;
    let _guard = state.study_locks.lock(change.study_id).await;

    let study = match state.store.apply_state_change(&change, policy).await? {
        StateChangeOutcome::Applied(study) => study,
        StateChangeOutcome::NotFound => {
            return Err(CoreError::study_not_found(change.study_id).into());
        }
        StateChangeOutcome::Rejected { current } => {
            tracing::warn!(
                study_id = %change.study_id,
                from = %current,
                to = %change.status,
                "Rejected out-of-order state change"
            );
            policy.check(current, change.status)?;
            return Err(CoreError::Conflict(format!(
                "Study is {current}, state change was not applied"
            ))
            .into());
        }
    };

    tracing::info!(
        study_id = %study.id,
        status = %study.status,
        results = study.result_file_ids.len(),
        "Study state changed"
    );

    broadcast_state_change(&state.ws_manager, &study).await;
    Ok(study)
}

/// Push the study's current state to every viewer in its room.
pub async fn broadcast_state_change(ws_manager: &WsManager, study: &Study) -> usize {
    let event = ServerEvent::StudyStateChange(StudyStateChanged::from(study));

    let message = match event.to_message() {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(study_id = %study.id, error = %e, "Failed to encode state change");
            return 0;
        }
    };

    let delivered = ws_manager
        .broadcast_to_room(&study.id.to_string(), message)
        .await;
    tracing::debug!(study_id = %study.id, delivered, "State change broadcast");
    delivered
}
