//! Repository for the `transaction_photos` table.

use sqlx::{PgExecutor, PgPool};
use kiosk_core::photo::PhotoType;
use kiosk_core::types::DbId;

use crate::models::photo::TransactionPhoto;

const COLUMNS: &str = "id, transaction_id, photo_type, file_path, created_at";

pub struct PhotoRepo;

impl PhotoRepo {
    /// Record a photo. `file_path` is relative to the photo root.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        transaction_id: DbId,
        photo_type: PhotoType,
        file_path: &str,
    ) -> Result<TransactionPhoto, sqlx::Error> {
        let query = format!(
            "INSERT INTO transaction_photos (transaction_id, photo_type, file_path) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransactionPhoto>(&query)
            .bind(transaction_id)
            .bind(photo_type.as_str())
            .bind(file_path)
            .fetch_one(executor)
            .await
    }

    /// Most recent photo of the given type for a transaction.
    pub async fn latest(
        pool: &PgPool,
        transaction_id: DbId,
        photo_type: PhotoType,
    ) -> Result<Option<TransactionPhoto>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transaction_photos \
             WHERE transaction_id = $1 AND photo_type = $2 \
             ORDER BY created_at DESC, id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, TransactionPhoto>(&query)
            .bind(transaction_id)
            .bind(photo_type.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_transaction(
        pool: &PgPool,
        transaction_id: DbId,
    ) -> Result<Vec<TransactionPhoto>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transaction_photos \
             WHERE transaction_id = $1 \
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, TransactionPhoto>(&query)
            .bind(transaction_id)
            .fetch_all(pool)
            .await
    }
}
