//! Repository for the `inventory` table.
//!
//! Counter mutations are single `UPDATE` statements that read and write the
//! invariant fields together, so concurrent borrow/return/verify operations
//! never interleave a read with a separate write.

use sqlx::{PgConnection, PgPool};
use kiosk_core::inventory::{AVAILABLE, LOW_STOCK, NOT_AVAILABLE};
use kiosk_core::types::DbId;

use crate::models::inventory::{CreateInventory, Inventory};

const COLUMNS: &str = "\
    id, equipment_id, quantity, available_quantity, borrowed_quantity, \
    damaged_quantity, maintenance_quantity, minimum_stock_level, \
    availability_status, last_updated";

pub struct InventoryRepo;

impl InventoryRepo {
    /// Insert a row with derived availability.
    pub async fn create(pool: &PgPool, input: &CreateInventory) -> Result<Inventory, sqlx::Error> {
        let counts = input.counts();
        let query = format!(
            "INSERT INTO inventory \
                (equipment_id, quantity, available_quantity, borrowed_quantity, \
                 damaged_quantity, maintenance_quantity, minimum_stock_level, availability_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Inventory>(&query)
            .bind(input.equipment_id)
            .bind(counts.quantity)
            .bind(counts.available())
            .bind(counts.borrowed)
            .bind(counts.damaged)
            .bind(counts.maintenance)
            .bind(counts.minimum_stock_level)
            .bind(counts.availability_status())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_equipment(
        pool: &PgPool,
        equipment_id: DbId,
    ) -> Result<Option<Inventory>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM inventory WHERE equipment_id = $1");
        sqlx::query_as::<_, Inventory>(&query)
            .bind(equipment_id)
            .fetch_optional(pool)
            .await
    }

    /// Check one borrowed unit back in, optionally into damaged stock, and
    /// recompute availability in the same statement.
    ///
    /// Returns `None` when no inventory row matched; the caller must treat
    /// that as a conflict and roll back.
    pub async fn settle_return(
        conn: &mut PgConnection,
        equipment_id: DbId,
        damaged: bool,
    ) -> Result<Option<Inventory>, sqlx::Error> {
        let damaged_delta: i32 = if damaged { 1 } else { 0 };
        let available = "GREATEST(quantity - GREATEST(borrowed_quantity - 1, 0) \
                         - (damaged_quantity + $2) - maintenance_quantity, 0)";
        let query = format!(
            "UPDATE inventory SET \
                borrowed_quantity = GREATEST(borrowed_quantity - 1, 0), \
                damaged_quantity = damaged_quantity + $2, \
                available_quantity = {available}, \
                availability_status = CASE \
                    WHEN {available} <= 0 THEN $3 \
                    WHEN {available} <= minimum_stock_level THEN $4 \
                    ELSE $5 \
                END, \
                last_updated = NOW() \
             WHERE equipment_id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Inventory>(&query)
            .bind(equipment_id)
            .bind(damaged_delta)
            .bind(NOT_AVAILABLE)
            .bind(LOW_STOCK)
            .bind(AVAILABLE)
            .fetch_optional(&mut *conn)
            .await
    }
}
