use axum::routing::{get, post};
use axum::Router;

use crate::handlers::transactions;
use crate::state::AppState;

/// Routes mounted at `/transactions`.
///
/// ```text
/// GET    /{id}/comparison-status  -> comparison_status
/// POST   /{id}/return             -> record_return
/// POST   /{id}/comparison         -> request_comparison
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/comparison-status",
            get(transactions::comparison_status),
        )
        .route("/{id}/return", post(transactions::record_return))
        .route("/{id}/comparison", post(transactions::request_comparison))
}
