//! Reference/return photo selection.

use kiosk_core::photo::PhotoType;
use kiosk_core::policy::ItemSize;
use kiosk_db::models::transaction::Transaction;
use kiosk_db::repositories::{EquipmentRepo, PhotoRepo};
use sqlx::PgPool;

use crate::error::PipelineResult;
use crate::storage::PhotoStore;

/// The photo pair a comparison would use. Paths are relative and were found
/// on disk at resolution time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPhotos {
    pub reference: Option<String>,
    pub returned: Option<String>,
}

/// Select at most one reference photo (latest `borrow` photo, or the
/// equipment's catalog image for non-large items) and at most one return
/// photo (latest `return` photo).
pub async fn resolve_photos(
    pool: &PgPool,
    store: &PhotoStore,
    transaction: &Transaction,
) -> PipelineResult<ResolvedPhotos> {
    let returned = match PhotoRepo::latest(pool, transaction.id, PhotoType::Return).await? {
        Some(photo) if store.exists(&photo.file_path).await => Some(photo.file_path),
        _ => None,
    };

    let mut reference = match PhotoRepo::latest(pool, transaction.id, PhotoType::Borrow).await? {
        Some(photo) if store.exists(&photo.file_path).await => Some(photo.file_path),
        _ => None,
    };

    if reference.is_none() && transaction.item_size() != ItemSize::Large {
        if let Some(equipment) = EquipmentRepo::find_by_id(pool, transaction.equipment_id).await? {
            if let Some(path) = equipment.image_path {
                if store.exists(&path).await {
                    reference = Some(path);
                }
            }
        }
    }

    Ok(ResolvedPhotos {
        reference,
        returned,
    })
}
