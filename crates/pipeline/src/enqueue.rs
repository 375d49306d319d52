//! Comparison job creation.
//!
//! Enqueue either inserts one pending job for a returned borrow row or, when
//! automated scoring cannot or should not run, writes the manual-review shape
//! directly. Repeated calls are no-ops while a job is pending or processing.

use serde::Serialize;

use kiosk_core::comparison_job::{ComparisonPayload, DEFAULT_PRIORITY};
use kiosk_core::error::CoreError;
use kiosk_core::policy::{ItemSize, Severity};
use kiosk_core::types::DbId;
use kiosk_core::verification::{review, TransactionType};
use kiosk_core::{MSG_MANUAL_REVIEW_LARGE, MSG_MANUAL_REVIEW_NO_REFERENCE};
use kiosk_db::models::comparison_job::NewComparisonJob;
use kiosk_db::models::transaction::ManualReviewWrite;
use kiosk_db::repositories::{ComparisonJobRepo, TransactionRepo};

use crate::error::{PipelineError, PipelineResult};
use crate::photos::resolve_photos;
use crate::worker::JobOutcome;
use crate::Pipeline;

#[derive(Debug, Clone, Copy)]
pub struct EnqueueOptions {
    pub priority: i16,
    /// Allow a new lifecycle for a row that already carries an automatic verdict.
    pub reprocess: bool,
    /// The finished job this run replaces, for the audit trail.
    pub reprocess_of: Option<DbId>,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            reprocess: false,
            reprocess_of: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A pending or processing job already exists.
    ActiveJob { job_id: DbId },
    /// An admin already decided this return.
    AdminDecided,
    /// The row already carries an automatic verdict and this is not a reprocess.
    AlreadyScored,
    /// No return photo on record (or on disk).
    NoReturnPhoto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualReviewReason {
    LargeItem,
    NoReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Queued { job_id: DbId, transaction_id: DbId },
    Skipped { skip: SkipReason },
    ManualReview { reason: ManualReviewReason },
}

impl EnqueueOutcome {
    pub fn job_id(&self) -> Option<DbId> {
        match self {
            EnqueueOutcome::Queued { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}

/// Result of an explicit comparison request, optionally run in-process.
#[derive(Debug, Clone, Serialize)]
pub struct EnqueueReport {
    pub enqueue: EnqueueOutcome,
    pub inline: Option<JobOutcome>,
}

impl Pipeline {
    /// Queue a comparison for `transaction_id`.
    pub async fn enqueue(
        &self,
        transaction_id: DbId,
        options: EnqueueOptions,
    ) -> PipelineResult<EnqueueOutcome> {
        let transaction = TransactionRepo::find_by_id(self.pool(), transaction_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("transaction", transaction_id))?;

        if TransactionType::parse(&transaction.transaction_type) != Some(TransactionType::Borrow) {
            return Err(CoreError::PreconditionFailed(
                "Only borrow transactions can be compared.".to_string(),
            )
            .into());
        }

        if transaction.processed_by.is_some() {
            return Ok(skipped(transaction_id, SkipReason::AdminDecided));
        }
        if !options.reprocess && transaction.verification_status().is_terminal() {
            return Ok(skipped(transaction_id, SkipReason::AlreadyScored));
        }

        if let Some(active) =
            ComparisonJobRepo::find_active_for_transaction(self.pool(), transaction_id).await?
        {
            return Ok(skipped(transaction_id, SkipReason::ActiveJob { job_id: active.id }));
        }

        let photos = resolve_photos(self.pool(), self.store(), &transaction).await?;
        let Some(return_path) = photos.returned else {
            return Ok(skipped(transaction_id, SkipReason::NoReturnPhoto));
        };

        let item_size = transaction.item_size();
        if item_size == ItemSize::Large {
            self.force_manual_review(transaction_id, MSG_MANUAL_REVIEW_LARGE)
                .await?;
            return Ok(EnqueueOutcome::ManualReview {
                reason: ManualReviewReason::LargeItem,
            });
        }
        let Some(reference_path) = photos.reference else {
            self.force_manual_review(transaction_id, MSG_MANUAL_REVIEW_NO_REFERENCE)
                .await?;
            return Ok(EnqueueOutcome::ManualReview {
                reason: ManualReviewReason::NoReference,
            });
        };

        let input = NewComparisonJob {
            transaction_id,
            priority: options.priority,
            payload: ComparisonPayload {
                reference_path,
                return_path,
                item_size,
                offline_similarity: transaction.similarity_score,
                offline_severity: transaction.severity(),
                reprocess: options.reprocess,
            },
            reprocess_of_job_id: options.reprocess_of,
        };

        let mut tx = self.pool().begin().await?;
        let Some(job) = ComparisonJobRepo::enqueue(&mut *tx, &input).await? else {
            // Lost the race against a concurrent enqueue.
            tx.rollback().await?;
            let winner = ComparisonJobRepo::latest_for_transaction(self.pool(), transaction_id)
                .await?
                .ok_or_else(|| {
                    CoreError::ConcurrencyConflict(format!(
                        "Job for transaction {transaction_id} vanished during enqueue."
                    ))
                })?;
            return Ok(skipped(transaction_id, SkipReason::ActiveJob { job_id: winner.id }));
        };
        TransactionRepo::mark_analyzing(&mut *tx, transaction_id).await?;
        tx.commit().await?;

        tracing::info!(
            job_id = job.id,
            transaction_id,
            priority = job.priority,
            reprocess = options.reprocess,
            "Comparison job queued",
        );

        Ok(EnqueueOutcome::Queued {
            job_id: job.id,
            transaction_id,
        })
    }

    /// Enqueue and, when `inline` is set, claim and process the new job
    /// before returning.
    pub async fn request_comparison(
        &self,
        transaction_id: DbId,
        options: EnqueueOptions,
        inline: bool,
    ) -> PipelineResult<EnqueueReport> {
        let enqueue = self.enqueue(transaction_id, options).await?;
        let inline = match (inline, enqueue.job_id()) {
            (true, Some(job_id)) => self.run_inline(job_id).await?,
            _ => None,
        };
        Ok(EnqueueReport { enqueue, inline })
    }

    async fn force_manual_review(&self, transaction_id: DbId, message: &str) -> PipelineResult<()> {
        TransactionRepo::apply_manual_review(
            self.pool(),
            transaction_id,
            &ManualReviewWrite {
                review_status: review::MANUAL_REVIEW_REQUIRED,
                severity: Severity::Medium,
                message,
                ai_status: None,
            },
        )
        .await?;
        tracing::info!(transaction_id, reason = message, "Routed to manual review");
        Ok(())
    }
}

fn skipped(transaction_id: DbId, skip: SkipReason) -> EnqueueOutcome {
    tracing::debug!(transaction_id, ?skip, "Enqueue skipped");
    EnqueueOutcome::Skipped { skip }
}
