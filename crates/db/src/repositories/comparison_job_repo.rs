//! Repository for the `comparison_jobs` queue.
//!
//! Uses `ComparisonJobStatus` from `models::status` for every transition.
//! Claims are conditional updates guarded by `FOR UPDATE SKIP LOCKED`, so
//! two sweeps never process the same job.

use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use kiosk_core::types::DbId;

use crate::models::comparison_job::{ComparisonJob, NewComparisonJob};
use crate::models::status::ComparisonJobStatus;

/// Column list for `comparison_jobs` queries.
const COLUMNS: &str = "\
    id, transaction_id, status_id, priority, payload, result, error_message, \
    attempts, claimed_at, completed_at, reprocess_of_job_id, created_at, updated_at";

/// Rows eligible for a claim: pending, or processing with a claim older than
/// the staleness window (`$2` pending, `$1` processing, `$3` seconds).
const CLAIMABLE: &str = "\
    (status_id = $2 \
     OR (status_id = $1 AND claimed_at < NOW() - make_interval(secs => $3)))";

pub struct ComparisonJobRepo;

impl ComparisonJobRepo {
    /// Insert a pending job unless the transaction already has a pending or
    /// processing one. Returns `None` when skipped.
    pub async fn enqueue<'e, E: PgExecutor<'e>>(
        executor: E,
        input: &NewComparisonJob,
    ) -> Result<Option<ComparisonJob>, sqlx::Error> {
        // The conflict target must restate the partial index predicate.
        let query = format!(
            "INSERT INTO comparison_jobs (transaction_id, status_id, priority, payload, reprocess_of_job_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (transaction_id) WHERE status_id IN ({pending}, {processing}) DO NOTHING \
             RETURNING {COLUMNS}",
            pending = ComparisonJobStatus::Pending.id(),
            processing = ComparisonJobStatus::Processing.id(),
        );
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(input.transaction_id)
            .bind(ComparisonJobStatus::Pending.id())
            .bind(input.priority)
            .bind(Json(&input.payload))
            .bind(input.reprocess_of_job_id)
            .fetch_optional(executor)
            .await
    }

    /// Atomically claim the next claimable job, lowest priority value first,
    /// then oldest. Increments `attempts`.
    pub async fn claim_next(
        pool: &PgPool,
        stale_after_secs: i64,
    ) -> Result<Option<ComparisonJob>, sqlx::Error> {
        let query = format!(
            "UPDATE comparison_jobs \
             SET status_id = $1, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM comparison_jobs \
                 WHERE {CLAIMABLE} \
                 ORDER BY priority ASC, created_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(ComparisonJobStatus::Processing.id())
            .bind(ComparisonJobStatus::Pending.id())
            .bind(stale_after_secs as f64)
            .fetch_optional(pool)
            .await
    }

    /// Claim a specific job if it is still claimable. Used by the inline path.
    pub async fn claim_by_id(
        pool: &PgPool,
        job_id: DbId,
        stale_after_secs: i64,
    ) -> Result<Option<ComparisonJob>, sqlx::Error> {
        let query = format!(
            "UPDATE comparison_jobs \
             SET status_id = $1, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = $4 AND {CLAIMABLE} \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(ComparisonJobStatus::Processing.id())
            .bind(ComparisonJobStatus::Pending.id())
            .bind(stale_after_secs as f64)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// `processing → completed` for the claim identified by `attempts`.
    /// Returns `false` if the job left `processing` or was reclaimed since.
    pub async fn complete<'e, E: PgExecutor<'e>>(
        executor: E,
        job_id: DbId,
        attempts: i32,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE comparison_jobs \
             SET status_id = $2, result = $3, error_message = NULL, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4 AND attempts = $5",
        )
        .bind(job_id)
        .bind(ComparisonJobStatus::Completed.id())
        .bind(result)
        .bind(ComparisonJobStatus::Processing.id())
        .bind(attempts)
        .execute(executor)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// `processing → failed` for the claim identified by `attempts`. Returns
    /// `false` if the job is terminal or another worker holds a newer claim.
    pub async fn fail<'e, E: PgExecutor<'e>>(
        executor: E,
        job_id: DbId,
        attempts: i32,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE comparison_jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4 AND attempts = $5",
        )
        .bind(job_id)
        .bind(ComparisonJobStatus::Failed.id())
        .bind(error)
        .bind(ComparisonJobStatus::Processing.id())
        .bind(attempts)
        .execute(executor)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Whether `attempts` is still the live claim on a processing job.
    pub async fn holds_claim<'e, E: PgExecutor<'e>>(
        executor: E,
        job_id: DbId,
        attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM comparison_jobs \
             WHERE id = $1 AND status_id = $2 AND attempts = $3)",
        )
        .bind(job_id)
        .bind(ComparisonJobStatus::Processing.id())
        .bind(attempts)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ComparisonJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM comparison_jobs WHERE id = $1");
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recently created job for a transaction, in any state.
    pub async fn latest_for_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Option<ComparisonJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM comparison_jobs \
             WHERE transaction_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(transaction_id)
            .fetch_optional(pool)
            .await
    }

    /// The pending or processing job for a transaction, if any.
    pub async fn find_active_for_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Option<ComparisonJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM comparison_jobs \
             WHERE transaction_id = $1 AND status_id IN ($2, $3) \
             LIMIT 1"
        );
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(transaction_id)
            .bind(ComparisonJobStatus::Pending.id())
            .bind(ComparisonJobStatus::Processing.id())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Vec<ComparisonJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM comparison_jobs \
             WHERE transaction_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ComparisonJob>(&query)
            .bind(transaction_id)
            .fetch_all(pool)
            .await
    }
}
