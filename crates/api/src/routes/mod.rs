pub mod health;
pub mod studies;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                          WebSocket (study rooms)
///
/// /studies                     create (POST, auth)
/// /studies/change_state        worker state callback (POST, worker token)
/// /studies/{id}                get (auth, owner)
/// /studies/{id}/resubmit       resubmit (POST, auth, owner)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/studies", studies::router())
}
