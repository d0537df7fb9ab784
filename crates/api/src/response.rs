//! Shared response envelope types for API handlers.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: study }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "state": "done" }`, the acknowledgement the enhancement worker
/// expects from a state-change callback.
#[derive(Debug, Serialize)]
pub struct StateChangeAck {
    pub state: &'static str,
}

impl StateChangeAck {
    pub const DONE: StateChangeAck = StateChangeAck { state: "done" };
}
