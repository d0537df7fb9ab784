use axum::routing::{get, post};
use axum::Router;

use crate::handlers::studies;
use crate::state::AppState;

/// Routes mounted at `/studies`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(studies::create))
        .route("/change_state", post(studies::change_state))
        .route("/{id}", get(studies::get_by_id))
        .route("/{id}/resubmit", post(studies::resubmit))
}
