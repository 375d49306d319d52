//! Return-verification orchestration shared by the API server and the
//! worker binary.
//!
//! [`Pipeline`] owns the pool, the runtime configuration and the photo store.
//! Each submodule adds one group of operations to it:
//!
//! - [`returns`]: the kiosk return event
//! - [`enqueue`]: comparison job creation (or the manual-review shortcut)
//! - [`worker`]: claiming and processing jobs, sweeps and the watch loop
//! - [`verification`]: admin verify/flag/reject with inventory settlement
//! - [`status`]: the read-only polling projection
//! - [`backfill`]: operator-triggered bulk re-evaluation

pub mod backfill;
pub mod config;
pub mod enqueue;
pub mod error;
pub mod photos;
pub mod returns;
pub mod status;
pub mod storage;
pub mod verification;
pub mod worker;

use std::sync::Arc;

use sqlx::PgPool;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use storage::PhotoStore;

/// Cheap-to-clone handle to the verification pipeline.
#[derive(Clone)]
pub struct Pipeline {
    pool: PgPool,
    config: Arc<PipelineConfig>,
    store: PhotoStore,
}

impl Pipeline {
    pub fn new(pool: PgPool, config: PipelineConfig) -> Self {
        let store = PhotoStore::new(config.photo_root.clone());
        Self {
            pool,
            config: Arc::new(config),
            store,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &PhotoStore {
        &self.store
    }
}
