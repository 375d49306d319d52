//! Seed helpers shared by the repository tests.
#![allow(dead_code)]

use kiosk_core::types::DbId;
use kiosk_db::models::equipment::CreateEquipment;
use kiosk_db::models::inventory::{CreateInventory, Inventory};
use kiosk_db::models::transaction::{CreateTransaction, Transaction};
use kiosk_db::repositories::{EquipmentRepo, InventoryRepo, TransactionRepo};
use sqlx::PgPool;

pub async fn seed_equipment(pool: &PgPool, tag: &str) -> DbId {
    EquipmentRepo::create(
        pool,
        &CreateEquipment {
            rfid_tag: tag.to_string(),
            name: format!("Equipment {tag}"),
            image_path: None,
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn seed_inventory(
    pool: &PgPool,
    equipment_id: DbId,
    quantity: i32,
    borrowed: i32,
) -> Inventory {
    InventoryRepo::create(
        pool,
        &CreateInventory {
            equipment_id,
            quantity,
            borrowed_quantity: borrowed,
            damaged_quantity: 0,
            maintenance_quantity: 0,
            minimum_stock_level: Some(1),
        },
    )
    .await
    .unwrap()
}

pub async fn seed_borrow(pool: &PgPool, equipment_id: DbId, size: &str) -> Transaction {
    TransactionRepo::create(
        pool,
        &CreateTransaction {
            equipment_id,
            user_id: 1001,
            transaction_type: "Borrow".to_string(),
            quantity: None,
            item_size: Some(size.to_string()),
            expected_return_date: None,
            notes: None,
        },
    )
    .await
    .unwrap()
}
