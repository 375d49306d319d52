use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use kiosk_core::types::{DbId, Timestamp};

/// A row from the `equipment` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Equipment {
    pub id: DbId,
    pub rfid_tag: String,
    pub name: String,
    /// Canonical catalog photo, relative to the photo root.
    pub image_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEquipment {
    pub rfid_tag: String,
    pub name: String,
    pub image_path: Option<String>,
}
