//! Read-only polling projection of a transaction's verification state.

use serde::Serialize;

use kiosk_core::photo::PhotoType;
use kiosk_core::types::{DbId, Timestamp};
use kiosk_core::verification::VerificationStatus;
use kiosk_db::models::comparison_job::ComparisonJob;
use kiosk_db::models::status::ai_status;
use kiosk_db::models::transaction_meta::IMAGE_COMPARISON_KEY;
use kiosk_db::repositories::{
    ComparisonJobRepo, PhotoRepo, TransactionMetaRepo, TransactionRepo,
};

use crate::error::PipelineResult;
use crate::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: DbId,
    pub status: &'static str,
    pub priority: i16,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<&ComparisonJob> for JobSummary {
    fn from(job: &ComparisonJob) -> Self {
        Self {
            id: job.id,
            status: job.status().map(|s| s.as_str()).unwrap_or("unknown"),
            priority: job.priority,
            attempts: job.attempts,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            completed_at: job.completed_at,
        }
    }
}

/// The asynchronous `ai_*` mirror fields.
#[derive(Debug, Clone, Serialize)]
pub struct AiSnapshot {
    pub status: Option<String>,
    pub message: Option<String>,
    pub similarity_score: Option<f64>,
    pub severity_level: Option<String>,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub transaction_id: DbId,
    pub status: String,
    pub return_verification_status: String,
    pub return_review_status: Option<String>,
    pub similarity_score: Option<f64>,
    pub detected_issues: Option<String>,
    pub severity_level: Option<String>,
    pub comparison_preview: Option<String>,
    pub is_analyzing: bool,
    pub job: Option<JobSummary>,
    pub ai: AiSnapshot,
    pub is_ai_analyzing: bool,
    pub detailed_metrics: Option<serde_json::Value>,
    pub updated_at: Timestamp,
}

/// What is known about the latest job when the snapshot is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Active,
    Idle,
    /// The lookup failed; treated as still running.
    Unknown,
}

fn analyzing_flags(
    verification: VerificationStatus,
    ai: Option<&str>,
    job: JobState,
) -> (bool, bool) {
    let ai_running = ai_status::is_in_flight(ai);
    let is_analyzing = verification == VerificationStatus::Analyzing
        || job == JobState::Active
        || (job == JobState::Unknown && ai_running);
    let is_ai_analyzing = ai_running || job == JobState::Active;
    (is_analyzing, is_ai_analyzing)
}

impl Pipeline {
    /// Build the polling snapshot. `None` for unknown ids.
    ///
    /// Only the transaction lookup can fail the call; the secondary lookups
    /// (job, preview, metrics) degrade to empty values.
    pub async fn snapshot(&self, transaction_id: DbId) -> PipelineResult<Option<StatusSnapshot>> {
        let Some(transaction) = TransactionRepo::find_by_id(self.pool(), transaction_id).await?
        else {
            return Ok(None);
        };

        let (job, job_state) =
            match ComparisonJobRepo::latest_for_transaction(self.pool(), transaction_id).await {
                Ok(Some(job)) => {
                    let state = if job.is_active() {
                        JobState::Active
                    } else {
                        JobState::Idle
                    };
                    (Some(JobSummary::from(&job)), state)
                }
                Ok(None) => (None, JobState::Idle),
                Err(e) => {
                    tracing::warn!(transaction_id, error = %e, "Job lookup failed while polling");
                    (None, JobState::Unknown)
                }
            };

        let comparison_preview =
            match PhotoRepo::latest(self.pool(), transaction_id, PhotoType::Comparison).await {
                Ok(photo) => photo.map(|p| p.file_path),
                Err(e) => {
                    tracing::warn!(transaction_id, error = %e, "Preview lookup failed while polling");
                    None
                }
            };

        let detailed_metrics =
            match TransactionMetaRepo::find(self.pool(), transaction_id, IMAGE_COMPARISON_KEY).await
            {
                Ok(meta) => meta.map(|m| m.meta_value),
                Err(e) => {
                    tracing::warn!(transaction_id, error = %e, "Metrics lookup failed while polling");
                    None
                }
            };

        let (is_analyzing, is_ai_analyzing) = analyzing_flags(
            transaction.verification_status(),
            transaction.ai_analysis_status.as_deref(),
            job_state,
        );

        Ok(Some(StatusSnapshot {
            transaction_id,
            status: transaction.status,
            return_verification_status: transaction.return_verification_status,
            return_review_status: transaction.return_review_status,
            similarity_score: transaction.similarity_score,
            detected_issues: transaction.detected_issues,
            severity_level: transaction.severity_level,
            comparison_preview,
            is_analyzing,
            job,
            ai: AiSnapshot {
                status: transaction.ai_analysis_status,
                message: transaction.ai_analysis_message,
                similarity_score: transaction.ai_similarity_score,
                severity_level: transaction.ai_severity_level,
                meta: transaction.ai_analysis_meta,
            },
            is_ai_analyzing,
            detailed_metrics,
            updated_at: transaction.updated_at,
        }))
    }
}
