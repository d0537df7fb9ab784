//! Request extractors that gate access.
//!
//! - [`auth::AuthUser`] -- the signed-in user, from a JWT Bearer token.
//! - [`worker::WorkerAuth`] -- the enhancement worker, from `x-worker-token`.

pub mod auth;
pub mod worker;
