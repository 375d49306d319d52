//! Repository for the `transactions` table.
//!
//! Verification-affecting writes go through a connection that already holds
//! the row lock from [`TransactionRepo::lock_by_id`], so admin decisions and
//! job completions for one transaction are serialized.

use sqlx::{PgConnection, PgExecutor, PgPool};
use kiosk_core::photo::PhotoType;
use kiosk_core::types::DbId;
use kiosk_core::verification::{
    operational, review, AdminDecision, TransactionType, VerificationStatus,
};
use kiosk_core::MSG_ANALYZING;

use crate::models::status::ai_status;
use crate::models::transaction::{
    ComparisonWrite, CreateTransaction, ManualReviewWrite, Transaction,
};

/// Column list for `transactions` queries.
const COLUMNS: &str = "\
    id, equipment_id, user_id, transaction_type, status, quantity, \
    transaction_date, expected_return_date, actual_return_date, item_size, \
    return_verification_status, return_review_status, similarity_score, \
    severity_level, detected_issues, \
    ai_analysis_status, ai_analysis_message, ai_similarity_score, \
    ai_severity_level, ai_analysis_meta, \
    notes, processed_by, processed_at, inventory_settled_at, \
    created_at, updated_at";

pub struct TransactionRepo;

impl TransactionRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateTransaction,
    ) -> Result<Transaction, sqlx::Error> {
        let query = format!(
            "INSERT INTO transactions \
                (equipment_id, user_id, transaction_type, quantity, item_size, \
                 expected_return_date, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(input.equipment_id)
            .bind(input.user_id)
            .bind(&input.transaction_type)
            .bind(input.quantity.unwrap_or(1))
            .bind(input.item_size.as_deref().unwrap_or("medium"))
            .bind(input.expected_return_date)
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Load and row-lock a transaction for the rest of the caller's unit of work.
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Stamp the return: `Active → Pending Review`, `Not Yet Returned → Pending`.
    pub async fn mark_returned(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!(
            "UPDATE transactions SET \
                actual_return_date = COALESCE(actual_return_date, NOW()), \
                status = CASE WHEN status = $2 THEN $3 ELSE status END, \
                return_verification_status = CASE \
                    WHEN return_verification_status = $4 THEN $5 \
                    ELSE return_verification_status END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .bind(operational::ACTIVE)
            .bind(operational::PENDING_REVIEW)
            .bind(VerificationStatus::NotYetReturned.as_str())
            .bind(VerificationStatus::Pending.as_str())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Reflect a freshly queued job on the row.
    pub async fn mark_analyzing<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transactions SET \
                return_verification_status = CASE \
                    WHEN processed_by IS NULL AND return_verification_status IN ($2, $3) THEN $4 \
                    ELSE return_verification_status END, \
                ai_analysis_status = $5, \
                ai_analysis_message = $6 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(VerificationStatus::Pending.as_str())
        .bind(VerificationStatus::NotYetReturned.as_str())
        .bind(VerificationStatus::Analyzing.as_str())
        .bind(ai_status::PENDING)
        .bind(MSG_ANALYZING)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_ai_processing<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE transactions SET ai_analysis_status = $2 WHERE id = $1")
            .bind(id)
            .bind(ai_status::PROCESSING)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Force the manual-review terminal shape. Rows an admin already decided
    /// keep their verification fields; only the `ai_*` mirror is updated.
    pub async fn apply_manual_review<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        write: &ManualReviewWrite<'_>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE transactions SET \
                return_verification_status = CASE WHEN processed_by IS NULL THEN $2 \
                    ELSE return_verification_status END, \
                return_review_status = CASE WHEN processed_by IS NULL THEN $3 \
                    ELSE return_review_status END, \
                severity_level = CASE WHEN processed_by IS NULL THEN $4 \
                    ELSE severity_level END, \
                similarity_score = CASE WHEN processed_by IS NULL THEN NULL \
                    ELSE similarity_score END, \
                detected_issues = CASE WHEN processed_by IS NULL THEN $5 \
                    ELSE detected_issues END, \
                ai_analysis_status = $6, \
                ai_analysis_message = $5, \
                ai_similarity_score = NULL, \
                ai_severity_level = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(VerificationStatus::Pending.as_str())
        .bind(write.review_status)
        .bind(write.severity.as_str())
        .bind(write.message)
        .bind(write.ai_status)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write a comparison result. The `ai_*` mirror is always written; the
    /// plain fields and statuses only when `write.verdict` is set.
    pub async fn apply_comparison(
        conn: &mut PgConnection,
        id: DbId,
        write: &ComparisonWrite<'_>,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let (verification, review_status) = match write.verdict {
            Some((status, review_status)) => (Some(status.as_str()), Some(review_status)),
            None => (None, None),
        };
        let query = format!(
            "UPDATE transactions SET \
                ai_analysis_status = $2, \
                ai_analysis_message = $3, \
                ai_similarity_score = $4, \
                ai_severity_level = $5, \
                ai_analysis_meta = $6, \
                similarity_score = CASE WHEN $7 THEN $4 ELSE similarity_score END, \
                severity_level = CASE WHEN $7 THEN $5 ELSE severity_level END, \
                detected_issues = CASE WHEN $7 THEN $8 ELSE detected_issues END, \
                return_verification_status = COALESCE($9, return_verification_status), \
                return_review_status = COALESCE($10, return_review_status) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .bind(ai_status::COMPLETED)
            .bind(write.ai_message)
            .bind(write.similarity)
            .bind(write.severity.as_str())
            .bind(write.meta)
            .bind(write.verdict.is_some())
            .bind(write.detected_issues)
            .bind(verification)
            .bind(review_status)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Persist an admin decision on a locked row.
    pub async fn apply_admin_decision(
        conn: &mut PgConnection,
        id: DbId,
        decision: &AdminDecision,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let query = format!(
            "UPDATE transactions SET \
                status = $2, \
                return_verification_status = $3, \
                return_review_status = $4, \
                notes = $5, \
                processed_by = $6, \
                processed_at = $7, \
                inventory_settled_at = CASE WHEN $8 THEN $7 ELSE inventory_settled_at END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .bind(&decision.status)
            .bind(decision.verification_status.as_str())
            .bind(decision.review_status)
            .bind(&decision.notes)
            .bind(decision.processed_by)
            .bind(decision.processed_at)
            .bind(decision.settlement.is_some())
            .fetch_optional(&mut *conn)
            .await
    }

    /// Returned borrow rows that were never scored and are not already
    /// parked in manual review.
    pub async fn list_backfill_candidates(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT t.id FROM transactions t \
             WHERE t.transaction_type = $1 \
               AND t.similarity_score IS NULL \
               AND t.processed_by IS NULL \
               AND t.return_verification_status IN ($2, $3, $4) \
               AND (t.return_review_status IS NULL OR t.return_review_status NOT IN ($5, $6)) \
               AND EXISTS (SELECT 1 FROM transaction_photos p \
                           WHERE p.transaction_id = t.id AND p.photo_type = $7) \
             ORDER BY t.id ASC \
             LIMIT $8",
        )
        .bind(TransactionType::Borrow.as_str())
        .bind(VerificationStatus::NotYetReturned.as_str())
        .bind(VerificationStatus::Pending.as_str())
        .bind(VerificationStatus::Analyzing.as_str())
        .bind(review::MANUAL_REVIEW_REQUIRED)
        .bind(review::REVIEW_REQUIRED)
        .bind(PhotoType::Return.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Automatically scored (or failed) borrow rows that no admin has
    /// decided yet.
    pub async fn list_reprocess_candidates(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT t.id FROM transactions t \
             WHERE t.transaction_type = $1 \
               AND t.processed_by IS NULL \
               AND t.return_verification_status <> $2 \
               AND (t.similarity_score IS NOT NULL OR t.ai_analysis_status IN ($3, $4)) \
               AND EXISTS (SELECT 1 FROM transaction_photos p \
                           WHERE p.transaction_id = t.id AND p.photo_type = $5) \
             ORDER BY t.id ASC \
             LIMIT $6",
        )
        .bind(TransactionType::Borrow.as_str())
        .bind(VerificationStatus::Rejected.as_str())
        .bind(ai_status::COMPLETED)
        .bind(ai_status::FAILED)
        .bind(PhotoType::Return.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
