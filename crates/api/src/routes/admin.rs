//! Admin-only routes. Every handler takes an [`AdminUser`](crate::middleware::auth::AdminUser).

use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`.
pub fn router() -> Router<AppState> {
    Router::new().route("/comparisons/backfill", post(admin::run_backfill))
}
