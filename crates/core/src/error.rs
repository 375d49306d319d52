use crate::types::DbId;

/// Domain error taxonomy shared by every layer.
///
/// `NotFound` and `PreconditionFailed` are rejected at the API boundary with a
/// human-readable reason. `AnalysisFailed` is absorbed by the worker into the
/// manual-review fallback. `ConcurrencyConflict` and `StorageFailure` abort the
/// in-flight transition as a whole.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
