//! The storage seam used by the API layer.

use async_trait::async_trait;
use radiant_core::study_state::StateChange;
use radiant_core::study_status::{StudyStatus, TransitionPolicy};
use radiant_core::types::StudyId;

use crate::models::study::{NewStudy, Study};
use crate::repositories::StudyRepo;
use crate::DbPool;

/// Result of [`StudyStore::apply_state_change`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChangeOutcome {
    /// The change was written; carries the updated study.
    Applied(Study),
    NotFound,
    /// The transition policy refused the change; nothing was written.
    Rejected { current: StudyStatus },
}

/// Result of [`StudyStore::reset_for_resubmission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResubmitOutcome {
    Reset(Study),
    NotFound,
    /// The study is being processed; nothing was written.
    Rejected { current: StudyStatus },
}

/// Persistent study records.
///
/// Implementations must apply each mutation atomically: a concurrent
/// reader sees either the whole change or none of it.
#[async_trait]
pub trait StudyStore: Send + Sync {
    /// Insert a new `PENDING` study.
    async fn create(&self, input: NewStudy) -> Result<Study, sqlx::Error>;

    async fn find_by_id(&self, id: StudyId) -> Result<Option<Study>, sqlx::Error>;

    /// Write status, failure reason, result ids and (when present)
    /// metadata in one step, if `policy` allows the transition.
    async fn apply_state_change(
        &self,
        change: &StateChange,
        policy: TransitionPolicy,
    ) -> Result<StateChangeOutcome, sqlx::Error>;

    /// Move a non-`IN_PROGRESS` study back to `PENDING` with results,
    /// failure reason and metadata cleared.
    async fn reset_for_resubmission(&self, id: StudyId) -> Result<ResubmitOutcome, sqlx::Error>;

    /// Drop a study that was never announced to the worker.
    async fn discard(&self, id: StudyId) -> Result<bool, sqlx::Error>;

    async fn health_check(&self) -> Result<(), sqlx::Error>;
}

/// PostgreSQL-backed [`StudyStore`].
#[derive(Clone)]
pub struct PgStudyStore {
    pool: DbPool,
}

impl PgStudyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudyStore for PgStudyStore {
    async fn create(&self, input: NewStudy) -> Result<Study, sqlx::Error> {
        StudyRepo::create(&self.pool, &input).await
    }

    async fn find_by_id(&self, id: StudyId) -> Result<Option<Study>, sqlx::Error> {
        StudyRepo::find_by_id(&self.pool, id).await
    }

    async fn apply_state_change(
        &self,
        change: &StateChange,
        policy: TransitionPolicy,
    ) -> Result<StateChangeOutcome, sqlx::Error> {
        StudyRepo::apply_state_change(&self.pool, change, policy).await
    }

    async fn reset_for_resubmission(&self, id: StudyId) -> Result<ResubmitOutcome, sqlx::Error> {
        StudyRepo::reset_for_resubmission(&self.pool, id).await
    }

    async fn discard(&self, id: StudyId) -> Result<bool, sqlx::Error> {
        StudyRepo::delete(&self.pool, id).await
    }

    async fn health_check(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }
}
