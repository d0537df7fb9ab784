//! Study processing engine.
//!
//! - [`ingest`] -- persist worker state changes, then notify viewers.
//! - [`lifecycle`] -- create and resubmit studies on behalf of users.
//! - [`locks`] -- per-study serialization of the above.

pub mod ingest;
pub mod lifecycle;
pub mod locks;

pub use locks::StudyLocks;
