//! Kiosk-facing handlers: return event, comparison request, status polling.
//!
//! These run on the kiosk device session and carry no admin token.

use axum::extract::{Path, Query, State};
use axum::Json;
use kiosk_core::error::CoreError;
use kiosk_core::types::DbId;
use kiosk_pipeline::enqueue::{EnqueueOptions, EnqueueReport};
use kiosk_pipeline::returns::ReturnOutcome;
use kiosk_pipeline::status::StatusSnapshot;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::Envelope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    /// Path of the uploaded photo, relative to the photo root.
    pub photo_path: String,
    /// Process the comparison before responding.
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComparisonQuery {
    #[serde(default)]
    pub inline: bool,
}

/// GET /api/v1/transactions/{id}/comparison-status
///
/// Polled by the kiosk until `is_analyzing` turns false.
pub async fn comparison_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Envelope<StatusSnapshot>> {
    let snapshot = state
        .pipeline
        .snapshot(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "transaction",
            id,
        }))?;

    Ok(Envelope::new(snapshot))
}

/// POST /api/v1/transactions/{id}/return
pub async fn record_return(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ReturnRequest>,
) -> AppResult<Envelope<ReturnOutcome>> {
    if input.photo_path.trim().is_empty() {
        return Err(AppError::BadRequest("photo_path must not be empty".into()));
    }

    let outcome = state
        .pipeline
        .record_return(id, &input.photo_path, input.inline)
        .await?;

    Ok(Envelope::new(outcome))
}

/// POST /api/v1/transactions/{id}/comparison
///
/// Queue a comparison; `?inline=true` claims and processes it in-request.
pub async fn request_comparison(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(query): Query<ComparisonQuery>,
) -> AppResult<Envelope<EnqueueReport>> {
    let report = state
        .pipeline
        .request_comparison(id, EnqueueOptions::default(), query.inline)
        .await?;

    tracing::info!(
        transaction_id = id,
        job_id = ?report.enqueue.job_id(),
        inline = query.inline,
        "Comparison requested",
    );

    Ok(Envelope::new(report))
}
