//! Comparison job processing.
//!
//! A sweep claims jobs with [`ComparisonJobRepo::claim_next`] (`FOR UPDATE
//! SKIP LOCKED`), runs the similarity engine on a blocking thread, and then
//! applies the result in one short transaction that holds the transaction
//! row lock. Every claimed job ends `completed` or `failed` before the sweep
//! returns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use kiosk_core::comparison_job::RunKind;
use kiosk_core::error::CoreError;
use kiosk_core::photo::PhotoType;
use kiosk_core::policy::{detect_score_mismatch, Severity};
use kiosk_core::similarity::issues::SCORE_MISMATCH_WARNING;
use kiosk_core::similarity::preview::{encode_jpeg, render_preview};
use kiosk_core::similarity::{compare, load_image, ComparisonResult};
use kiosk_core::types::DbId;
use kiosk_core::verification::{accepts_automatic, automatic_decision, review};
use kiosk_core::MSG_COMPARISON_FAILED;
use kiosk_db::models::comparison_job::ComparisonJob;
use kiosk_db::models::status::ai_status;
use kiosk_db::models::transaction::{ComparisonWrite, ManualReviewWrite};
use kiosk_db::models::transaction_meta::IMAGE_COMPARISON_KEY;
use kiosk_db::repositories::{
    ComparisonJobRepo, PhotoRepo, TransactionMetaRepo, TransactionRepo,
};

use crate::error::{PipelineError, PipelineResult};
use crate::Pipeline;

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        job_id: DbId,
        transaction_id: DbId,
        similarity: f64,
        severity: Severity,
        /// Whether the verification fields were updated, or only the `ai_*` mirror.
        applied: bool,
    },
    Failed {
        job_id: DbId,
        transaction_id: DbId,
        reason: String,
    },
    /// The job left `processing` while it was being analyzed; the result was discarded.
    Superseded { job_id: DbId, transaction_id: DbId },
}

impl JobOutcome {
    pub fn transaction_id(&self) -> DbId {
        match self {
            JobOutcome::Completed { transaction_id, .. }
            | JobOutcome::Failed { transaction_id, .. }
            | JobOutcome::Superseded { transaction_id, .. } => *transaction_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub superseded: usize,
    pub outcomes: Vec<JobOutcome>,
}

impl SweepSummary {
    pub(crate) fn record(&mut self, outcome: JobOutcome) {
        self.claimed += 1;
        match outcome {
            JobOutcome::Completed { .. } => self.completed += 1,
            JobOutcome::Failed { .. } => self.failed += 1,
            JobOutcome::Superseded { .. } => self.superseded += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Output of the CPU-bound half of a job.
struct Analysis {
    result: ComparisonResult,
    preview_jpeg: Option<Vec<u8>>,
}

impl Pipeline {
    /// Claim and process up to `limit` jobs (default `sweep_batch_size`),
    /// with at most `sweep_concurrency` in flight.
    pub async fn sweep(&self, limit: Option<usize>) -> PipelineResult<SweepSummary> {
        let limit = limit.unwrap_or(self.config().sweep_batch_size);
        let mut summary = SweepSummary::default();
        if limit == 0 {
            return Ok(summary);
        }

        let budget = AtomicUsize::new(limit);
        let lanes = self.config().sweep_concurrency.clamp(1, limit);
        let results =
            futures::future::join_all((0..lanes).map(|_| self.sweep_lane(&budget))).await;

        let mut first_error = None;
        for lane in results {
            let (outcomes, error) = lane;
            for outcome in outcomes {
                summary.record(outcome);
            }
            if first_error.is_none() {
                first_error = error;
            }
        }

        tracing::info!(
            claimed = summary.claimed,
            completed = summary.completed,
            failed = summary.failed,
            superseded = summary.superseded,
            "Sweep finished",
        );

        match first_error {
            Some(e) if summary.claimed == 0 => Err(e),
            Some(e) => {
                tracing::error!(error = %e, "Sweep stopped early");
                Ok(summary)
            }
            None => Ok(summary),
        }
    }

    /// One sequential claim/process loop sharing the sweep's budget.
    async fn sweep_lane(&self, budget: &AtomicUsize) -> (Vec<JobOutcome>, Option<PipelineError>) {
        let mut outcomes = Vec::new();
        while take_slot(budget) {
            let claimed =
                ComparisonJobRepo::claim_next(self.pool(), self.config().stale_after_secs).await;
            match claimed {
                Ok(Some(job)) => outcomes.push(self.process_job(job, false).await),
                Ok(None) => break,
                Err(e) => return (outcomes, Some(e.into())),
            }
        }
        (outcomes, None)
    }

    /// Claim a specific job and process it on its own task, waiting for the
    /// outcome. Returns `None` if the job is no longer claimable (another
    /// worker has it).
    ///
    /// Dropping the returned future does not cancel the work: the job still
    /// runs to `completed` or `failed`.
    pub async fn run_inline(&self, job_id: DbId) -> PipelineResult<Option<JobOutcome>> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.claim_and_process(job_id).await }).await?
    }

    async fn claim_and_process(&self, job_id: DbId) -> PipelineResult<Option<JobOutcome>> {
        let claimed =
            ComparisonJobRepo::claim_by_id(self.pool(), job_id, self.config().stale_after_secs)
                .await?;
        match claimed {
            Some(job) => Ok(Some(self.process_job(job, true).await)),
            None => {
                tracing::debug!(job_id, "Job already claimed, not running inline");
                Ok(None)
            }
        }
    }

    /// Sweep every `interval` until `cancel` fires.
    pub async fn watch(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        tracing::info!(interval_ms = interval.as_millis() as u64, "Comparison worker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Comparison worker shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep(None).await {
                        tracing::error!(error = %e, "Sweep cycle failed");
                    }
                }
            }
        }
    }

    /// Drive one claimed job to `completed` or `failed`.
    async fn process_job(&self, job: ComparisonJob, inline: bool) -> JobOutcome {
        let job_id = job.id;
        let transaction_id = job.transaction_id;

        match self.try_process(&job, inline).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    job_id,
                    transaction_id,
                    attempts = job.attempts,
                    error = %reason,
                    "Comparison failed, routing to manual review",
                );
                if let Err(e) = self.fail_job(&job, &reason).await {
                    tracing::error!(job_id, transaction_id, error = %e, "Failed to record job failure");
                }
                JobOutcome::Failed {
                    job_id,
                    transaction_id,
                    reason,
                }
            }
        }
    }

    async fn try_process(&self, job: &ComparisonJob, inline: bool) -> PipelineResult<JobOutcome> {
        let config = self.config();
        if job.attempts > config.max_attempts {
            return Err(CoreError::AnalysisFailed(format!(
                "Gave up after {} attempts.",
                job.attempts - 1
            ))
            .into());
        }

        if !self.mark_processing(job).await? {
            tracing::warn!(
                job_id = job.id,
                transaction_id = job.transaction_id,
                "Claim lost before analysis started",
            );
            return Ok(JobOutcome::Superseded {
                job_id: job.id,
                transaction_id: job.transaction_id,
            });
        }

        let payload = job.decode_payload()?;
        let run_kind = match (payload.reprocess, inline) {
            (true, _) => RunKind::Reprocess,
            (false, true) => RunKind::Inline,
            (false, false) => RunKind::Sweep,
        };

        // Files are checked again here: they may have gone since enqueue.
        let reference_path = self.store().resolve(&payload.reference_path)?;
        let return_path = self.store().resolve(&payload.return_path)?;
        for (label, relative) in [
            ("Reference", &payload.reference_path),
            ("Return", &payload.return_path),
        ] {
            if !self.store().exists(relative).await {
                return Err(CoreError::AnalysisFailed(format!(
                    "{label} photo missing: {relative}"
                ))
                .into());
            }
        }

        let item_size = payload.item_size;
        let comparison = config.comparison.clone();
        let thresholds = config.thresholds.clone();
        let with_preview = config.enable_preview;
        let Analysis {
            mut result,
            preview_jpeg,
        } = tokio::task::spawn_blocking(move || -> Result<Analysis, CoreError> {
            let reference = load_image(&reference_path)?;
            let returned = load_image(&return_path)?;
            let result = compare(&reference, &returned, item_size, &comparison, &thresholds);
            let preview_jpeg = if with_preview {
                encode_jpeg(&render_preview(&reference, &returned))
                    .map_err(|e| tracing::warn!(error = %e, "Preview encoding failed"))
                    .ok()
            } else {
                None
            };
            Ok(Analysis {
                result,
                preview_jpeg,
            })
        })
        .await??;

        let score_mismatch = detect_score_mismatch(payload.offline_similarity, result.similarity);
        if score_mismatch {
            result.issues.insert(0, SCORE_MISMATCH_WARNING.to_string());
        }

        let preview_path = match preview_jpeg {
            Some(bytes) => match self.store().write_preview(job.transaction_id, &bytes).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(job_id = job.id, error = %e, "Could not store comparison preview");
                    None
                }
            },
            None => None,
        };

        let meta = json!({
            "algorithm_version": result.algorithm_version,
            "run_kind": run_kind.as_str(),
            "job_id": job.id,
            "attempts": job.attempts,
            "analyzed_at": chrono::Utc::now(),
            "score_mismatch": score_mismatch,
            "offline_similarity": payload.offline_similarity,
            "offline_severity": payload.offline_severity,
            "preview_path": preview_path,
            "result": result,
        });
        let detected_issues = result.detected_issues();
        let ai_message = format!(
            "Similarity {:.2}%: {}",
            result.similarity,
            result.verdict.label()
        );

        let mut tx = self.pool().begin().await?;
        let transaction = TransactionRepo::lock_by_id(&mut tx, job.transaction_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("transaction", job.transaction_id))?;

        let applied = accepts_automatic(
            transaction.verification_status(),
            transaction.processed_by,
            payload.reprocess,
        );
        let verdict = applied.then(|| {
            let decision = automatic_decision(
                config.thresholds.automatic_outcome(result.similarity, item_size),
                item_size,
            );
            (decision.verification_status, decision.review_status)
        });

        TransactionRepo::apply_comparison(
            &mut tx,
            job.transaction_id,
            &ComparisonWrite {
                similarity: result.similarity,
                severity: result.severity,
                detected_issues: &detected_issues,
                ai_message: &ai_message,
                meta: &meta,
                verdict,
            },
        )
        .await?;
        TransactionMetaRepo::upsert(&mut *tx, job.transaction_id, IMAGE_COMPARISON_KEY, &meta)
            .await?;
        if let Some(path) = &preview_path {
            PhotoRepo::create(&mut *tx, job.transaction_id, PhotoType::Comparison, path).await?;
        }

        let job_result = json!({
            "similarity": result.similarity,
            "severity": result.severity,
            "verdict": result.verdict,
            "confidence": result.confidence,
            "applied": applied,
            "run_kind": run_kind.as_str(),
            "preview_path": preview_path,
        });
        if !ComparisonJobRepo::complete(&mut *tx, job.id, job.attempts, &job_result).await? {
            tx.rollback().await?;
            tracing::warn!(
                job_id = job.id,
                transaction_id = job.transaction_id,
                "Job no longer processing, result discarded",
            );
            return Ok(JobOutcome::Superseded {
                job_id: job.id,
                transaction_id: job.transaction_id,
            });
        }
        tx.commit().await?;

        tracing::info!(
            job_id = job.id,
            transaction_id = job.transaction_id,
            similarity = result.similarity,
            severity = result.severity.as_str(),
            applied,
            run_kind = run_kind.as_str(),
            "Comparison completed",
        );

        Ok(JobOutcome::Completed {
            job_id: job.id,
            transaction_id: job.transaction_id,
            similarity: result.similarity,
            severity: result.severity,
            applied,
        })
    }

    /// Set `ai_analysis_status = processing` while this claim is still the
    /// live one. Returns `false`, writing nothing, once the job has been
    /// reclaimed or finished elsewhere.
    async fn mark_processing(&self, job: &ComparisonJob) -> PipelineResult<bool> {
        let mut tx = self.pool().begin().await?;
        TransactionRepo::lock_by_id(&mut tx, job.transaction_id).await?;

        if !ComparisonJobRepo::holds_claim(&mut *tx, job.id, job.attempts).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        TransactionRepo::mark_ai_processing(&mut *tx, job.transaction_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Mark the job failed and put the transaction into the failure shape,
    /// atomically. A stale claim leaves both untouched.
    async fn fail_job(&self, job: &ComparisonJob, reason: &str) -> PipelineResult<()> {
        let mut tx = self.pool().begin().await?;
        TransactionRepo::lock_by_id(&mut tx, job.transaction_id).await?;

        if !ComparisonJobRepo::fail(&mut *tx, job.id, job.attempts, reason).await? {
            tx.rollback().await?;
            return Ok(());
        }
        TransactionRepo::apply_manual_review(
            &mut *tx,
            job.transaction_id,
            &ManualReviewWrite {
                review_status: review::REVIEW_REQUIRED,
                severity: Severity::High,
                message: MSG_COMPARISON_FAILED,
                ai_status: Some(ai_status::FAILED),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

fn take_slot(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_hands_out_exactly_limit_slots() {
        let budget = AtomicUsize::new(3);
        let taken = (0..10).filter(|_| take_slot(&budget)).count();
        assert_eq!(taken, 3);
        assert!(!take_slot(&budget));
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = SweepSummary::default();
        summary.record(JobOutcome::Completed {
            job_id: 1,
            transaction_id: 10,
            similarity: 99.0,
            severity: Severity::None,
            applied: true,
        });
        summary.record(JobOutcome::Failed {
            job_id: 2,
            transaction_id: 11,
            reason: "decode".to_string(),
        });
        assert_eq!(summary.claimed, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.outcomes[1].transaction_id(), 11);
    }

    #[test]
    fn outcomes_serialize_with_tag() {
        let outcome = JobOutcome::Superseded {
            job_id: 4,
            transaction_id: 9,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "superseded");
        assert_eq!(value["job_id"], 4);
    }
}
