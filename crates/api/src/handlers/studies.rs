//! Handlers for `/studies`.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use radiant_core::error::CoreError;
use radiant_core::new_study::UploadedInstance;
use radiant_core::study_state::ChangeStudyStateRequest;
use radiant_core::types::StudyId;
use radiant_db::models::study::Study;

use crate::engine::{ingest, lifecycle};
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::worker::WorkerAuth;
use crate::response::{DataResponse, StateChangeAck};
use crate::state::AppState;

/// Path ids that are not UUIDs cannot name a study.
fn parse_study_id(raw: &str) -> Result<StudyId, CoreError> {
    raw.parse().map_err(|_| CoreError::study_not_found(raw))
}

/// POST /studies
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(instances): Json<Vec<UploadedInstance>>,
) -> AppResult<(StatusCode, Json<DataResponse<Study>>)> {
    let study = lifecycle::create_study(&state, auth.user_id, &instances).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: study })))
}

/// GET /studies/{id}
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Study>>> {
    let study_id = parse_study_id(&id)?;
    let study = lifecycle::find_owned_study(&state, auth.user_id, study_id).await?;
    Ok(Json(DataResponse { data: study }))
}

/// POST /studies/{id}/resubmit
pub async fn resubmit(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Study>>> {
    let study_id = parse_study_id(&id)?;
    let study = lifecycle::resubmit_study(&state, auth.user_id, study_id).await?;
    Ok(Json(DataResponse { data: study }))
}

/// POST /studies/change_state
///
/// Called by the enhancement worker. The body is parsed here rather than
/// through the `Json` extractor so that malformed payloads get the same
/// `{ error, code }` shape as every other failure.
pub async fn change_state(
    _worker: WorkerAuth,
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<StateChangeAck>> {
    let change = ChangeStudyStateRequest::from_slice(&body)?.validate()?;
    ingest::apply_state_change(&state, change).await?;
    Ok(Json(StateChangeAck::DONE))
}
