//! Repository for the `equipment` table.

use sqlx::PgPool;
use kiosk_core::types::DbId;

use crate::models::equipment::{CreateEquipment, Equipment};

const COLUMNS: &str = "id, rfid_tag, name, image_path, created_at, updated_at";

pub struct EquipmentRepo;

impl EquipmentRepo {
    pub async fn create(pool: &PgPool, input: &CreateEquipment) -> Result<Equipment, sqlx::Error> {
        let query = format!(
            "INSERT INTO equipment (rfid_tag, name, image_path) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Equipment>(&query)
            .bind(&input.rfid_tag)
            .bind(&input.name)
            .bind(&input.image_path)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Equipment>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM equipment WHERE id = $1");
        sqlx::query_as::<_, Equipment>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
