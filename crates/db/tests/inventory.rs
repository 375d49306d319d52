//! Integration tests for atomic inventory settlement.

mod common;

use kiosk_core::inventory::{AVAILABLE, LOW_STOCK, NOT_AVAILABLE};
use kiosk_db::models::inventory::Inventory;
use kiosk_db::repositories::InventoryRepo;
use sqlx::PgPool;

fn assert_invariant(row: &Inventory) {
    let expected = (row.quantity
        - row.borrowed_quantity
        - row.damaged_quantity
        - row.maintenance_quantity)
        .max(0);
    assert_eq!(row.available_quantity, expected);
    assert_eq!(row.availability_status, row.counts().availability_status());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_derives_availability(pool: PgPool) {
    let equipment_id = common::seed_equipment(&pool, "INV-1").await;
    let row = common::seed_inventory(&pool, equipment_id, 3, 3).await;
    assert_eq!(row.available_quantity, 0);
    assert_eq!(row.availability_status, NOT_AVAILABLE);
    assert_invariant(&row);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_good_return_frees_unit(pool: PgPool) {
    let equipment_id = common::seed_equipment(&pool, "INV-2").await;
    common::seed_inventory(&pool, equipment_id, 3, 2).await;

    let mut conn = pool.acquire().await.unwrap();
    let row = InventoryRepo::settle_return(&mut conn, equipment_id, false)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.borrowed_quantity, 1);
    assert_eq!(row.damaged_quantity, 0);
    assert_eq!(row.available_quantity, 2);
    assert_eq!(row.availability_status, AVAILABLE);
    assert_invariant(&row);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_damaged_return_moves_unit_to_damaged(pool: PgPool) {
    let equipment_id = common::seed_equipment(&pool, "INV-3").await;
    common::seed_inventory(&pool, equipment_id, 2, 1).await;

    let mut conn = pool.acquire().await.unwrap();
    let row = InventoryRepo::settle_return(&mut conn, equipment_id, true)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.borrowed_quantity, 0);
    assert_eq!(row.damaged_quantity, 1);
    assert_eq!(row.available_quantity, 1);
    assert_eq!(row.availability_status, LOW_STOCK);
    assert_invariant(&row);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_borrowed_is_floored_at_zero(pool: PgPool) {
    let equipment_id = common::seed_equipment(&pool, "INV-4").await;
    common::seed_inventory(&pool, equipment_id, 4, 0).await;

    let mut conn = pool.acquire().await.unwrap();
    let row = InventoryRepo::settle_return(&mut conn, equipment_id, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.borrowed_quantity, 0);
    assert_eq!(row.available_quantity, 4);
    assert_invariant(&row);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_missing_row_is_reported(pool: PgPool) {
    let equipment_id = common::seed_equipment(&pool, "INV-5").await;
    let mut conn = pool.acquire().await.unwrap();
    let row = InventoryRepo::settle_return(&mut conn, equipment_id, false)
        .await
        .unwrap();
    assert!(row.is_none());
}
