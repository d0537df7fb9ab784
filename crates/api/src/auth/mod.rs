//! Authentication primitives.
//!
//! Users sign in through an external identity service; this server only
//! verifies the access tokens it issues.
//!
//! - [`jwt`] -- JWT access-token validation (and generation, for tooling and tests).

pub mod jwt;
