use serde::Serialize;
use sqlx::FromRow;
use kiosk_core::comparison_job::ComparisonPayload;
use kiosk_core::types::{DbId, Timestamp};

use super::status::{ComparisonJobStatus, StatusId};

/// A row from the `comparison_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ComparisonJob {
    pub id: DbId,
    pub transaction_id: DbId,
    pub status_id: StatusId,
    pub priority: i16,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub reprocess_of_job_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ComparisonJob {
    pub fn status(&self) -> Option<ComparisonJobStatus> {
        ComparisonJobStatus::from_id(self.status_id)
    }

    pub fn is_active(&self) -> bool {
        self.status().is_some_and(ComparisonJobStatus::is_active)
    }

    /// Decode the payload snapshot taken at enqueue time.
    pub fn decode_payload(&self) -> Result<ComparisonPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// DTO for inserting a new job.
#[derive(Debug, Clone)]
pub struct NewComparisonJob {
    pub transaction_id: DbId,
    pub priority: i16,
    pub payload: ComparisonPayload,
    pub reprocess_of_job_id: Option<DbId>,
}
