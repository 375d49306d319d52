//! Repository for the `transaction_meta` side table.

use sqlx::{PgExecutor, PgPool};
use kiosk_core::types::DbId;

use crate::models::transaction_meta::TransactionMeta;

const COLUMNS: &str = "id, transaction_id, meta_key, meta_value, created_at, updated_at";

pub struct TransactionMetaRepo;

impl TransactionMetaRepo {
    /// Insert or replace the value stored under `key`.
    pub async fn upsert<'e, E: PgExecutor<'e>>(
        executor: E,
        transaction_id: DbId,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<TransactionMeta, sqlx::Error> {
        let query = format!(
            "INSERT INTO transaction_meta (transaction_id, meta_key, meta_value) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (transaction_id, meta_key) \
             DO UPDATE SET meta_value = EXCLUDED.meta_value \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TransactionMeta>(&query)
            .bind(transaction_id)
            .bind(key)
            .bind(value)
            .fetch_one(executor)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        transaction_id: DbId,
        key: &str,
    ) -> Result<Option<TransactionMeta>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM transaction_meta \
             WHERE transaction_id = $1 AND meta_key = $2"
        );
        sqlx::query_as::<_, TransactionMeta>(&query)
            .bind(transaction_id)
            .bind(key)
            .fetch_optional(pool)
            .await
    }
}
