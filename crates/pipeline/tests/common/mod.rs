//! Fixtures shared by the pipeline tests: a photo root in a temp dir,
//! synthetic photos, and seeded rows.
#![allow(dead_code)]

use std::path::Path;

use image::{Rgb, RgbImage};
use kiosk_core::photo::PhotoType;
use kiosk_core::types::DbId;
use kiosk_db::models::equipment::CreateEquipment;
use kiosk_db::models::inventory::{CreateInventory, Inventory};
use kiosk_db::models::transaction::{CreateTransaction, Transaction};
use kiosk_db::repositories::{EquipmentRepo, InventoryRepo, PhotoRepo, TransactionRepo};
use kiosk_pipeline::{Pipeline, PipelineConfig};
use sqlx::PgPool;
use tempfile::TempDir;

pub const BORROW_NOTES: &str = "Borrowed for chemistry lab";

pub struct Harness {
    pub pipeline: Pipeline,
    pub pool: PgPool,
    pub root: TempDir,
}

impl Harness {
    pub fn new(pool: PgPool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            photo_root: root.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        Self {
            pipeline: Pipeline::new(pool.clone(), config),
            pool,
            root,
        }
    }

    /// Write a synthetic photo under the root and return its relative path.
    pub fn write_photo(&self, relative: &str, image: &RgbImage) -> String {
        let path = self.root.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image.save(&path).unwrap();
        relative.to_string()
    }

    pub fn write_bytes(&self, relative: &str, bytes: &[u8]) -> String {
        let path = self.root.path().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        relative.to_string()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.root.path().join(Path::new(relative)).is_file()
    }

    /// Equipment with four units, one of them already out on loan.
    pub async fn seed_equipment(&self, tag: &str) -> (DbId, Inventory) {
        let equipment_id = EquipmentRepo::create(
            &self.pool,
            &CreateEquipment {
                rfid_tag: tag.to_string(),
                name: format!("Microscope {tag}"),
                image_path: None,
            },
        )
        .await
        .unwrap()
        .id;
        let inventory = InventoryRepo::create(
            &self.pool,
            &CreateInventory {
                equipment_id,
                quantity: 4,
                borrowed_quantity: 1,
                damaged_quantity: 0,
                maintenance_quantity: 0,
                minimum_stock_level: Some(1),
            },
        )
        .await
        .unwrap();
        (equipment_id, inventory)
    }

    pub async fn seed_borrow(&self, equipment_id: DbId, size: &str) -> Transaction {
        TransactionRepo::create(
            &self.pool,
            &CreateTransaction {
                equipment_id,
                user_id: 2024001,
                transaction_type: "Borrow".to_string(),
                quantity: None,
                item_size: Some(size.to_string()),
                expected_return_date: None,
                notes: Some(BORROW_NOTES.to_string()),
            },
        )
        .await
        .unwrap()
    }

    /// A borrow with a reference photo on record and on disk.
    pub async fn seed_borrow_with_photo(&self, tag: &str, size: &str) -> Transaction {
        let (equipment_id, _) = self.seed_equipment(tag).await;
        let transaction = self.seed_borrow(equipment_id, size).await;
        let path = self.write_photo(&format!("uploads/borrow_{tag}.png"), &reference_image());
        PhotoRepo::create(&self.pool, transaction.id, PhotoType::Borrow, &path)
            .await
            .unwrap();
        transaction
    }

    pub async fn transaction(&self, id: DbId) -> Transaction {
        TransactionRepo::find_by_id(&self.pool, id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn inventory(&self, equipment_id: DbId) -> Inventory {
        InventoryRepo::find_by_equipment(&self.pool, equipment_id)
            .await
            .unwrap()
            .unwrap()
    }
}

/// A structured test scene: gradient background with a dark object and a
/// bright label.
pub fn reference_image() -> RgbImage {
    RgbImage::from_fn(160, 120, |x, y| {
        if (40..110).contains(&x) && (30..90).contains(&y) {
            Rgb([40, 45, 60])
        } else if (120..150).contains(&x) && (10..30).contains(&y) {
            Rgb([230, 220, 40])
        } else {
            let v = (x + y) as u8;
            Rgb([120 + v / 4, 130 + v / 5, 140 + v / 6])
        }
    })
}
