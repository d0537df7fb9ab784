//! Domain types and pure logic for study processing.
//!
//! Nothing in this crate performs I/O. The database, broker and HTTP
//! layers all build on these types.

pub mod error;
pub mod metadata;
pub mod new_study;
pub mod study_state;
pub mod study_status;
pub mod types;
