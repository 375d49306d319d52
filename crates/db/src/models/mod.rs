//! Row structs and DTOs.
//!
//! Each submodule holds a `FromRow` + `Serialize` struct matching the table
//! row and, where rows are created through this crate, a create DTO.

pub mod comparison_job;
pub mod equipment;
pub mod inventory;
pub mod photo;
pub mod status;
pub mod transaction;
pub mod transaction_meta;
