//! Repository for the `studies` table.
//!
//! Every mutation is a single statement or a single row-locked
//! transaction, so concurrent writers for the same study never observe or
//! leave behind a partial update.

use radiant_core::study_state::StateChange;
use radiant_core::study_status::{StudyStatus, TransitionPolicy};
use radiant_core::types::StudyId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::study::{NewStudy, Study, StudyRow};
use crate::store::{ResubmitOutcome, StateChangeOutcome};

/// Column list for `studies` queries.
const COLUMNS: &str = "\
    id, user_id, files_ids, result_file_ids, status, failure_reason, \
    description, metadata, created_at, updated_at";

pub struct StudyRepo;

impl StudyRepo {
    /// Insert a new `PENDING` study.
    pub async fn create(pool: &PgPool, input: &NewStudy) -> Result<Study, sqlx::Error> {
        let query = format!(
            "INSERT INTO studies (id, user_id, files_ids, status, description) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StudyRow>(&query)
            .bind(uuid::Uuid::now_v7())
            .bind(input.user_id)
            .bind(&input.files_ids)
            .bind(StudyStatus::INITIAL.as_str())
            .bind(&input.description)
            .fetch_one(pool)
            .await?
            .try_into()
    }

    pub async fn find_by_id(pool: &PgPool, id: StudyId) -> Result<Option<Study>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM studies WHERE id = $1");
        sqlx::query_as::<_, StudyRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Study::try_from)
            .transpose()
    }

    /// Apply a worker-reported state change.
    ///
    /// The row is locked with `FOR UPDATE` while the transition policy is
    /// checked, so the check and the write see the same status. Metadata is
    /// only overwritten when the change carries some.
    pub async fn apply_state_change(
        pool: &PgPool,
        change: &StateChange,
        policy: TransitionPolicy,
    ) -> Result<StateChangeOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(current) = Self::lock_status(&mut tx, change.study_id).await? else {
            return Ok(StateChangeOutcome::NotFound);
        };

        if !policy.permits(current, change.status) {
            return Ok(StateChangeOutcome::Rejected { current });
        }

        let query = format!(
            "UPDATE studies \
             SET status = $2, failure_reason = $3, result_file_ids = $4, \
                 metadata = COALESCE($5, metadata), updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, StudyRow>(&query)
            .bind(change.study_id)
            .bind(change.status.as_str())
            .bind(change.failure_reason.as_deref())
            .bind(&change.result_file_ids)
            .bind(change.metadata.clone().map(Json))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(StateChangeOutcome::Applied(row.try_into()?))
    }

    /// Reset a study so the pipeline runs again.
    ///
    /// Clears results, failure reason and metadata and moves the study back
    /// to `PENDING`, unless it is currently `IN_PROGRESS`.
    pub async fn reset_for_resubmission(
        pool: &PgPool,
        id: StudyId,
    ) -> Result<ResubmitOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(current) = Self::lock_status(&mut tx, id).await? else {
            return Ok(ResubmitOutcome::NotFound);
        };

        if !current.can_resubmit() {
            return Ok(ResubmitOutcome::Rejected { current });
        }

        let query = format!(
            "UPDATE studies \
             SET status = $2, result_file_ids = '{{}}', failure_reason = NULL, \
                 metadata = NULL, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, StudyRow>(&query)
            .bind(id)
            .bind(StudyStatus::Pending.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(ResubmitOutcome::Reset(row.try_into()?))
    }

    /// Remove a study row. Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: StudyId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM studies WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn lock_status(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: StudyId,
    ) -> Result<Option<StudyStatus>, sqlx::Error> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM studies WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;

        status
            .map(|s| s.parse::<StudyStatus>().map_err(|e| sqlx::Error::Decode(Box::new(e))))
            .transpose()
    }
}
