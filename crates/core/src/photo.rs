//! Photo record kinds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoType {
    Borrow,
    Return,
    Comparison,
}

impl PhotoType {
    pub fn as_str(self) -> &'static str {
        match self {
            PhotoType::Borrow => "borrow",
            PhotoType::Return => "return",
            PhotoType::Comparison => "comparison",
        }
    }
}

/// Directory (relative to the photo root) that holds generated previews.
pub const PREVIEW_DIR: &str = "uploads/transaction_photos";

/// Relative path of a generated comparison preview.
pub fn preview_relative_path(transaction_id: i64, stamp: i64) -> String {
    format!("{PREVIEW_DIR}/comparison_{transaction_id}_{stamp}.jpg")
}
