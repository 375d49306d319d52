//! Repository layer.
//!
//! Each repository is a zero-sized struct with async methods. Plain reads
//! take `&PgPool`; methods that participate in a multi-statement unit of
//! work take `&mut PgConnection` (pass `&mut tx`) or any `PgExecutor`.

pub mod comparison_job_repo;
pub mod equipment_repo;
pub mod inventory_repo;
pub mod photo_repo;
pub mod transaction_meta_repo;
pub mod transaction_repo;

pub use comparison_job_repo::ComparisonJobRepo;
pub use equipment_repo::EquipmentRepo;
pub use inventory_repo::InventoryRepo;
pub use photo_repo::PhotoRepo;
pub use transaction_meta_repo::TransactionMetaRepo;
pub use transaction_repo::TransactionRepo;
