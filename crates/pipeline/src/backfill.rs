//! Operator-triggered bulk re-evaluation.
//!
//! `backfill` queues comparisons for returned rows that were never scored.
//! `reprocess` starts a new job lifecycle for rows that already carry an
//! automatic result; it is the only path that replaces a finished score.
//! Both report one outcome per row plus a summary.

use std::collections::HashMap;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use kiosk_core::comparison_job::REPROCESS_PRIORITY;
use kiosk_core::types::DbId;
use kiosk_db::repositories::{ComparisonJobRepo, TransactionRepo};

use crate::enqueue::{EnqueueOptions, EnqueueOutcome};
use crate::error::PipelineResult;
use crate::worker::{JobOutcome, SweepSummary};
use crate::Pipeline;

/// Rows considered per run when no limit is given.
pub const DEFAULT_BACKFILL_LIMIT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillMode {
    Backfill,
    Reprocess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOutcome {
    Queued,
    Skipped,
    Updated,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowReport {
    pub transaction_id: DbId,
    /// The job this run queued for the row, if any.
    pub job_id: Option<DbId>,
    pub outcome: RowOutcome,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub queued: usize,
    pub skipped: usize,
    pub updated: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillReport {
    pub mode: BackfillMode,
    pub rows: Vec<RowReport>,
    pub summary: BackfillSummary,
    pub sweep: Option<SweepSummary>,
}

impl BackfillReport {
    fn new(mode: BackfillMode) -> Self {
        Self {
            mode,
            rows: Vec::new(),
            summary: BackfillSummary::default(),
            sweep: None,
        }
    }

    fn push(&mut self, transaction_id: DbId, outcome: RowOutcome, detail: String) {
        self.push_row(RowReport {
            transaction_id,
            job_id: None,
            outcome,
            detail,
        });
    }

    fn push_row(&mut self, row: RowReport) {
        tracing::info!(
            transaction_id = row.transaction_id,
            job_id = row.job_id,
            outcome = ?row.outcome,
            detail = %row.detail,
            "Backfill row",
        );
        self.rows.push(row);
    }

    fn record_enqueue(&mut self, transaction_id: DbId, result: PipelineResult<EnqueueOutcome>) {
        let (job_id, outcome, detail) = match result {
            Ok(EnqueueOutcome::Queued { job_id, .. }) => {
                (Some(job_id), RowOutcome::Queued, format!("job {job_id} queued"))
            }
            Ok(EnqueueOutcome::Skipped { skip }) => {
                (None, RowOutcome::Skipped, format!("{skip:?}"))
            }
            Ok(EnqueueOutcome::ManualReview { reason }) => {
                (None, RowOutcome::Updated, format!("manual review: {reason:?}"))
            }
            Err(e) => (None, RowOutcome::Error, e.to_string()),
        };
        self.push_row(RowReport {
            transaction_id,
            job_id,
            outcome,
            detail,
        });
    }

    /// Job ids queued by this run, with their transaction.
    fn queued_jobs(&self) -> Vec<(DbId, DbId)> {
        self.rows
            .iter()
            .filter(|r| r.outcome == RowOutcome::Queued)
            .filter_map(|r| r.job_id.map(|job_id| (r.transaction_id, job_id)))
            .collect()
    }

    fn mark_error(&mut self, transaction_id: DbId, detail: String) {
        if let Some(row) = self
            .rows
            .iter_mut()
            .find(|r| r.transaction_id == transaction_id && r.outcome == RowOutcome::Queued)
        {
            row.outcome = RowOutcome::Error;
            row.detail = detail;
        }
    }

    /// Fold sweep results into the per-row outcomes of queued rows.
    fn apply_sweep(&mut self, sweep: SweepSummary) {
        let by_transaction: HashMap<DbId, JobOutcome> = sweep
            .outcomes
            .iter()
            .map(|o| (o.transaction_id(), o.clone()))
            .collect();

        for row in self
            .rows
            .iter_mut()
            .filter(|r| r.outcome == RowOutcome::Queued)
        {
            match by_transaction.get(&row.transaction_id) {
                Some(JobOutcome::Completed {
                    similarity,
                    severity,
                    ..
                }) => {
                    row.outcome = RowOutcome::Updated;
                    row.detail = format!("similarity {similarity:.2}, severity {}", severity.as_str());
                }
                Some(JobOutcome::Failed { reason, .. }) => {
                    row.outcome = RowOutcome::Error;
                    row.detail = reason.clone();
                }
                Some(JobOutcome::Superseded { .. }) | None => {}
            }
        }
        self.sweep = Some(sweep);
    }

    fn finish(mut self) -> Self {
        let mut summary = BackfillSummary::default();
        for row in &self.rows {
            match row.outcome {
                RowOutcome::Queued => summary.queued += 1,
                RowOutcome::Skipped => summary.skipped += 1,
                RowOutcome::Updated => summary.updated += 1,
                RowOutcome::Error => summary.errors += 1,
            }
        }
        tracing::info!(
            mode = ?self.mode,
            queued = summary.queued,
            skipped = summary.skipped,
            updated = summary.updated,
            errors = summary.errors,
            "Backfill finished",
        );
        self.summary = summary;
        self
    }
}

impl Pipeline {
    /// Queue comparisons for returned rows that were never scored.
    pub async fn backfill(&self, limit: Option<i64>, run_sweep: bool) -> PipelineResult<BackfillReport> {
        let ids = TransactionRepo::list_backfill_candidates(
            self.pool(),
            limit.unwrap_or(DEFAULT_BACKFILL_LIMIT),
        )
        .await?;

        let mut report = BackfillReport::new(BackfillMode::Backfill);
        for id in ids {
            report.record_enqueue(id, self.enqueue(id, EnqueueOptions::default()).await);
        }

        if run_sweep {
            self.run_queued(&mut report).await;
        }
        Ok(report.finish())
    }

    /// Start a fresh job lifecycle for one row, or for every automatically
    /// scored row no admin has decided yet.
    pub async fn reprocess(
        &self,
        transaction_id: Option<DbId>,
        limit: Option<i64>,
        run_sweep: bool,
    ) -> PipelineResult<BackfillReport> {
        let ids = match transaction_id {
            Some(id) => vec![id],
            None => {
                TransactionRepo::list_reprocess_candidates(
                    self.pool(),
                    limit.unwrap_or(DEFAULT_BACKFILL_LIMIT),
                )
                .await?
            }
        };

        let mut report = BackfillReport::new(BackfillMode::Reprocess);
        for id in ids {
            let previous = match ComparisonJobRepo::latest_for_transaction(self.pool(), id).await {
                Ok(job) => job.filter(|j| !j.is_active()).map(|j| j.id),
                Err(e) => {
                    report.push(id, RowOutcome::Error, e.to_string());
                    continue;
                }
            };
            let options = EnqueueOptions {
                priority: REPROCESS_PRIORITY,
                reprocess: true,
                reprocess_of: previous,
            };
            report.record_enqueue(id, self.enqueue(id, options).await);
        }

        if run_sweep {
            self.run_queued(&mut report).await;
        }
        Ok(report.finish())
    }

    /// Process exactly the jobs this run queued, by id. Jobs queued by
    /// anyone else stay for the regular sweep.
    async fn run_queued(&self, report: &mut BackfillReport) {
        let queued = report.queued_jobs();
        if queued.is_empty() {
            return;
        }

        let lanes = self.config().sweep_concurrency.max(1);
        let results: Vec<_> = futures::stream::iter(queued)
            .map(|(transaction_id, job_id)| async move {
                (transaction_id, job_id, self.run_inline(job_id).await)
            })
            .buffer_unordered(lanes)
            .collect()
            .await;

        let mut sweep = SweepSummary::default();
        for (transaction_id, job_id, result) in results {
            match result {
                Ok(Some(outcome)) => sweep.record(outcome),
                Ok(None) => {
                    tracing::debug!(job_id, transaction_id, "Queued job taken by another worker")
                }
                Err(e) => {
                    tracing::error!(job_id, transaction_id, error = %e, "Queued job could not run");
                    report.mark_error(transaction_id, e.to_string());
                }
            }
        }
        report.apply_sweep(sweep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enqueue::SkipReason;
    use kiosk_core::policy::Severity;

    #[test]
    fn sweep_results_promote_queued_rows() {
        let mut report = BackfillReport::new(BackfillMode::Backfill);
        report.record_enqueue(
            1,
            Ok(EnqueueOutcome::Queued {
                job_id: 10,
                transaction_id: 1,
            }),
        );
        report.record_enqueue(
            2,
            Ok(EnqueueOutcome::Skipped {
                skip: SkipReason::NoReturnPhoto,
            }),
        );
        report.record_enqueue(
            3,
            Ok(EnqueueOutcome::Queued {
                job_id: 11,
                transaction_id: 3,
            }),
        );

        report.apply_sweep(SweepSummary {
            claimed: 2,
            completed: 1,
            failed: 1,
            superseded: 0,
            outcomes: vec![
                JobOutcome::Completed {
                    job_id: 10,
                    transaction_id: 1,
                    similarity: 97.5,
                    severity: Severity::None,
                    applied: true,
                },
                JobOutcome::Failed {
                    job_id: 11,
                    transaction_id: 3,
                    reason: "Analysis failed: corrupt".to_string(),
                },
            ],
        });

        let report = report.finish();
        assert_eq!(
            report.summary,
            BackfillSummary {
                queued: 0,
                skipped: 1,
                updated: 1,
                errors: 1,
            }
        );
        assert_eq!(report.rows[0].outcome, RowOutcome::Updated);
        assert_eq!(report.rows[2].outcome, RowOutcome::Error);
    }

    #[test]
    fn only_rows_queued_by_this_run_are_processed() {
        let mut report = BackfillReport::new(BackfillMode::Reprocess);
        report.record_enqueue(
            4,
            Ok(EnqueueOutcome::Queued {
                job_id: 40,
                transaction_id: 4,
            }),
        );
        report.record_enqueue(
            5,
            Ok(EnqueueOutcome::Skipped {
                skip: SkipReason::NoReturnPhoto,
            }),
        );
        report.push(6, RowOutcome::Error, "lookup failed".to_string());

        assert_eq!(report.queued_jobs(), vec![(4, 40)]);
        assert_eq!(report.rows[0].job_id, Some(40));
        assert_eq!(report.rows[1].job_id, None);

        report.mark_error(4, "Background task failed".to_string());
        assert_eq!(report.rows[0].outcome, RowOutcome::Error);
        assert!(report.queued_jobs().is_empty());
    }

    #[test]
    fn mode_parses_lowercase() {
        let mode: BackfillMode = serde_json::from_str("\"reprocess\"").unwrap();
        assert_eq!(mode, BackfillMode::Reprocess);
    }
}
