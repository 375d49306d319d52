use serde::Serialize;
use sqlx::FromRow;
use kiosk_core::types::{DbId, Timestamp};

/// Key under which the latest comparison breakdown is stored.
pub const IMAGE_COMPARISON_KEY: &str = "image_comparison";

/// A row from the `transaction_meta` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TransactionMeta {
    pub id: DbId,
    pub transaction_id: DbId,
    pub meta_key: String,
    pub meta_value: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
