//! Admin verify/flag/reject.

use axum::extract::State;
use axum::Json;
use kiosk_core::types::DbId;
use kiosk_core::verification::AdminAction;
use kiosk_pipeline::verification::AdminActionResult;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AdminUser;
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerificationRequest {
    pub transaction_id: DbId,
    pub action: AdminAction,
    pub notes: Option<String>,
}

/// POST /api/v1/verification
///
/// Verify, flag or reject a returned item. Verification checks the unit back
/// into inventory in the same database transaction.
pub async fn apply_action(
    admin: AdminUser,
    State(state): State<AppState>,
    Json(input): Json<VerificationRequest>,
) -> AppResult<Envelope<AdminActionResult>> {
    let result = state
        .pipeline
        .apply_admin_action(
            input.transaction_id,
            input.action,
            input.notes.as_deref(),
            &admin.actor(),
        )
        .await?;

    Ok(Envelope::new(result))
}
