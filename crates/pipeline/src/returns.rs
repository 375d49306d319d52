//! Kiosk return event.

use serde::Serialize;

use kiosk_core::comparison_job::RETURN_EVENT_PRIORITY;
use kiosk_core::error::CoreError;
use kiosk_core::photo::PhotoType;
use kiosk_core::types::DbId;
use kiosk_core::verification::{TransactionType, VerificationStatus};
use kiosk_db::repositories::{PhotoRepo, TransactionRepo};

use crate::enqueue::{EnqueueOptions, EnqueueOutcome};
use crate::error::{PipelineError, PipelineResult};
use crate::status::StatusSnapshot;
use crate::storage::normalize_relative;
use crate::worker::JobOutcome;
use crate::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct ReturnOutcome {
    pub enqueue: EnqueueOutcome,
    pub inline: Option<JobOutcome>,
    pub snapshot: StatusSnapshot,
}

impl Pipeline {
    /// Register the return photo, stamp the return, and queue the comparison.
    ///
    /// With `inline`, the new job is claimed and processed before returning,
    /// so the kiosk can show a verdict immediately.
    pub async fn record_return(
        &self,
        transaction_id: DbId,
        photo_path: &str,
        inline: bool,
    ) -> PipelineResult<ReturnOutcome> {
        let photo_path = normalize_relative(photo_path);
        self.store().resolve(&photo_path)?;
        if !self.store().exists(&photo_path).await {
            return Err(CoreError::PreconditionFailed(format!(
                "Return photo '{photo_path}' was not found."
            ))
            .into());
        }

        let mut tx = self.pool().begin().await?;
        let transaction = TransactionRepo::lock_by_id(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("transaction", transaction_id))?;

        if TransactionType::parse(&transaction.transaction_type) != Some(TransactionType::Borrow) {
            return Err(CoreError::PreconditionFailed(
                "Only borrow transactions can be returned.".to_string(),
            )
            .into());
        }
        if transaction.processed_by.is_some()
            || transaction.verification_status() == VerificationStatus::Rejected
        {
            return Err(CoreError::PreconditionFailed(
                "This return has already been reviewed.".to_string(),
            )
            .into());
        }

        PhotoRepo::create(&mut *tx, transaction_id, PhotoType::Return, &photo_path).await?;
        TransactionRepo::mark_returned(&mut tx, transaction_id).await?;
        tx.commit().await?;

        tracing::info!(transaction_id, photo_path = %photo_path, "Return recorded");

        let report = self
            .request_comparison(
                transaction_id,
                EnqueueOptions {
                    priority: RETURN_EVENT_PRIORITY,
                    ..EnqueueOptions::default()
                },
                inline,
            )
            .await?;

        let snapshot = self
            .snapshot(transaction_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("transaction", transaction_id))?;

        Ok(ReturnOutcome {
            enqueue: report.enqueue,
            inline: report.inline,
            snapshot,
        })
    }
}
