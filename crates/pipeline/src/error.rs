use kiosk_core::error::CoreError;

/// Error type for pipeline operations.
///
/// Domain failures travel as [`CoreError`]; infrastructure failures keep their
/// source so the HTTP layer can classify and sanitize them.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    /// Fold into the domain taxonomy. Persistence and I/O problems become
    /// `StorageFailure`.
    pub fn into_core(self) -> CoreError {
        match self {
            PipelineError::Core(e) => e,
            PipelineError::Database(e) => CoreError::StorageFailure(e.to_string()),
            PipelineError::Io(e) => CoreError::StorageFailure(e.to_string()),
            PipelineError::Join(e) => CoreError::Internal(e.to_string()),
            PipelineError::Json(e) => CoreError::AnalysisFailed(e.to_string()),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: kiosk_core::types::DbId) -> Self {
        PipelineError::Core(CoreError::NotFound { entity, id })
    }
}
