use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use kiosk_core::inventory::StockCounts;
use kiosk_core::types::{DbId, Timestamp};

/// A row from the `inventory` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Inventory {
    pub id: DbId,
    pub equipment_id: DbId,
    pub quantity: i32,
    pub available_quantity: i32,
    pub borrowed_quantity: i32,
    pub damaged_quantity: i32,
    pub maintenance_quantity: i32,
    pub minimum_stock_level: i32,
    pub availability_status: String,
    pub last_updated: Timestamp,
}

impl Inventory {
    pub fn counts(&self) -> StockCounts {
        StockCounts {
            quantity: self.quantity,
            borrowed: self.borrowed_quantity,
            damaged: self.damaged_quantity,
            maintenance: self.maintenance_quantity,
            minimum_stock_level: self.minimum_stock_level,
        }
    }
}

/// DTO for seeding an inventory row. `available_quantity` and
/// `availability_status` are derived on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInventory {
    pub equipment_id: DbId,
    pub quantity: i32,
    #[serde(default)]
    pub borrowed_quantity: i32,
    #[serde(default)]
    pub damaged_quantity: i32,
    #[serde(default)]
    pub maintenance_quantity: i32,
    pub minimum_stock_level: Option<i32>,
}

impl CreateInventory {
    pub fn counts(&self) -> StockCounts {
        StockCounts {
            quantity: self.quantity,
            borrowed: self.borrowed_quantity,
            damaged: self.damaged_quantity,
            maintenance: self.maintenance_quantity,
            minimum_stock_level: self.minimum_stock_level.unwrap_or(1),
        }
    }
}
