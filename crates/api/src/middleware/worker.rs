use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use radiant_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the shared worker secret.
pub const WORKER_TOKEN_HEADER: &str = "x-worker-token";

/// Gate for worker callbacks.
///
/// Passes unconditionally when no `WORKER_TOKEN` is configured; otherwise
/// the request must carry a matching `x-worker-token` header.
#[derive(Debug, Clone, Copy)]
pub struct WorkerAuth;

impl FromRequestParts<AppState> for WorkerAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.worker_token.as_deref() else {
            return Ok(WorkerAuth);
        };

        let presented = parts
            .headers
            .get(WORKER_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());

        match presented {
            Some(token) if token == expected => Ok(WorkerAuth),
            Some(_) => {
                tracing::warn!("Rejected worker callback with wrong token");
                Err(CoreError::Unauthorized("Invalid worker token".into()).into())
            }
            None => Err(CoreError::Unauthorized("Missing worker token".into()).into()),
        }
    }
}
