//! Operator entry point for backfill and reprocess runs.

use axum::extract::State;
use axum::Json;
use kiosk_core::types::DbId;
use kiosk_pipeline::backfill::{BackfillMode, BackfillReport};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AdminUser;
use crate::response::Envelope;
use crate::state::AppState;

/// Upper bound on rows per HTTP-triggered run.
pub const MAX_BACKFILL_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct BackfillRequest {
    pub mode: BackfillMode,
    /// Process queued jobs before responding.
    #[serde(default)]
    pub run_sweep: bool,
    /// Reprocess only: restrict to one transaction.
    pub transaction_id: Option<DbId>,
    pub limit: Option<i64>,
}

/// POST /api/v1/admin/comparisons/backfill
pub async fn run_backfill(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(input): Json<BackfillRequest>,
) -> AppResult<Envelope<BackfillReport>> {
    if let Some(limit) = input.limit {
        if !(1..=MAX_BACKFILL_LIMIT).contains(&limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {MAX_BACKFILL_LIMIT}"
            )));
        }
    }

    tracing::info!(
        user_id = admin.user_id,
        mode = ?input.mode,
        run_sweep = input.run_sweep,
        "Backfill requested",
    );

    let report = match input.mode {
        BackfillMode::Backfill => {
            if input.transaction_id.is_some() {
                return Err(AppError::BadRequest(
                    "transaction_id is only accepted in reprocess mode".into(),
                ));
            }
            state.pipeline.backfill(input.limit, input.run_sweep).await?
        }
        BackfillMode::Reprocess => {
            state
                .pipeline
                .reprocess(input.transaction_id, input.limit, input.run_sweep)
                .await?
        }
    };

    Ok(Envelope::new(report))
}
