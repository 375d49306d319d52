pub mod admin;
pub mod health;
pub mod transactions;

use axum::routing::post;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /transactions/{id}/comparison-status     status polling (GET)
/// /transactions/{id}/return                return event (POST)
/// /transactions/{id}/comparison            enqueue, ?inline=true (POST)
///
/// /verification                            admin verify/flag/reject (POST)
///
/// /admin/comparisons/backfill              backfill or reprocess (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/transactions", transactions::router())
        .route("/verification", post(handlers::verification::apply_action))
        .nest("/admin", admin::router())
}
