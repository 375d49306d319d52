use serde::Serialize;
use sqlx::FromRow;
use kiosk_core::types::{DbId, Timestamp};

/// A row from the `transaction_photos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TransactionPhoto {
    pub id: DbId,
    pub transaction_id: DbId,
    pub photo_type: String,
    /// Relative to the photo root.
    pub file_path: String,
    pub created_at: Timestamp,
}
