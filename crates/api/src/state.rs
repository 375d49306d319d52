use std::sync::Arc;

use kiosk_pipeline::Pipeline;

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: kiosk_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Return, comparison and verification orchestration.
    pub pipeline: Pipeline,
}
