//! Liveness check for the load balancer and the kiosk's connectivity light.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    /// The photo root is a readable directory. Comparisons fail without it.
    pub photo_store: bool,
}

/// GET /health. 503 when either dependency is down.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let database = kiosk_db::health_check(&state.pool).await.is_ok();
    let photo_store = tokio::fs::metadata(state.pipeline.store().root())
        .await
        .is_ok_and(|meta| meta.is_dir());

    let healthy = database && photo_store;
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    if !healthy {
        tracing::warn!(database, photo_store, "Health check degraded");
    }

    (
        code,
        Json(Health {
            status: if healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            database,
            photo_store,
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
