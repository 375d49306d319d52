//! Transaction rows and the field groups the pipeline writes back.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use kiosk_core::policy::{ItemSize, Severity};
use kiosk_core::types::{DbId, Timestamp};
use kiosk_core::verification::{TransactionState, TransactionType, VerificationStatus};

/// A row from the `transactions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub id: DbId,
    pub equipment_id: DbId,
    pub user_id: DbId,
    pub transaction_type: String,
    pub status: String,
    pub quantity: i32,
    pub transaction_date: Timestamp,
    pub expected_return_date: Option<Timestamp>,
    pub actual_return_date: Option<Timestamp>,
    pub item_size: String,
    pub return_verification_status: String,
    pub return_review_status: Option<String>,
    pub similarity_score: Option<f64>,
    pub severity_level: Option<String>,
    pub detected_issues: Option<String>,
    pub ai_analysis_status: Option<String>,
    pub ai_analysis_message: Option<String>,
    pub ai_similarity_score: Option<f64>,
    pub ai_severity_level: Option<String>,
    pub ai_analysis_meta: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub processed_by: Option<DbId>,
    pub processed_at: Option<Timestamp>,
    pub inventory_settled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Transaction {
    pub fn item_size(&self) -> ItemSize {
        ItemSize::parse_lenient(&self.item_size)
    }

    pub fn verification_status(&self) -> VerificationStatus {
        VerificationStatus::parse_or_pending(Some(&self.return_verification_status))
    }

    pub fn severity(&self) -> Option<Severity> {
        self.severity_level.as_deref().and_then(Severity::parse)
    }

    /// The fields the verification state machine reads.
    pub fn state(&self) -> TransactionState {
        TransactionState {
            // The column is constrained to Borrow/Return.
            transaction_type: TransactionType::parse(&self.transaction_type)
                .unwrap_or(TransactionType::Return),
            status: self.status.clone(),
            verification_status: self.verification_status(),
            severity: self.severity(),
            notes: self.notes.clone(),
            processed_by: self.processed_by,
            inventory_settled: self.inventory_settled_at.is_some(),
        }
    }
}

/// DTO for inserting a borrow or return row.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub equipment_id: DbId,
    pub user_id: DbId,
    pub transaction_type: String,
    pub quantity: Option<i32>,
    pub item_size: Option<String>,
    pub expected_return_date: Option<Timestamp>,
    pub notes: Option<String>,
}

/// Terminal shape written when automated comparison cannot or should not run.
#[derive(Debug, Clone)]
pub struct ManualReviewWrite<'a> {
    pub review_status: &'a str,
    pub severity: Severity,
    pub message: &'a str,
    pub ai_status: Option<&'a str>,
}

/// Comparison result fields written on job completion.
#[derive(Debug, Clone)]
pub struct ComparisonWrite<'a> {
    pub similarity: f64,
    pub severity: Severity,
    pub detected_issues: &'a str,
    pub ai_message: &'a str,
    pub meta: &'a serde_json::Value,
    /// Verification/review statuses, when the state machine accepts the result.
    pub verdict: Option<(VerificationStatus, &'a str)>,
}
