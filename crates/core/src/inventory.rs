//! Inventory counter arithmetic.
//!
//! The database applies the same formulas inside a single `UPDATE`; these
//! functions exist so callers and tests can reason about the expected result.

use serde::Serialize;

pub const NOT_AVAILABLE: &str = "Not Available";
pub const LOW_STOCK: &str = "Low Stock";
pub const AVAILABLE: &str = "Available";

/// Per-equipment counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockCounts {
    pub quantity: i32,
    pub borrowed: i32,
    pub damaged: i32,
    pub maintenance: i32,
    pub minimum_stock_level: i32,
}

impl StockCounts {
    /// `max(quantity - borrowed - damaged - maintenance, 0)`
    pub fn available(&self) -> i32 {
        (self.quantity - self.borrowed - self.damaged - self.maintenance).max(0)
    }

    pub fn availability_status(&self) -> &'static str {
        availability_status(self.available(), self.minimum_stock_level)
    }

    /// Counters after one borrowed unit comes back.
    pub fn settle_return(&self, damaged: bool) -> StockCounts {
        StockCounts {
            borrowed: (self.borrowed - 1).max(0),
            damaged: if damaged { self.damaged + 1 } else { self.damaged },
            ..*self
        }
    }
}

pub fn availability_status(available: i32, minimum_stock_level: i32) -> &'static str {
    if available <= 0 {
        NOT_AVAILABLE
    } else if available <= minimum_stock_level {
        LOW_STOCK
    } else {
        AVAILABLE
    }
}
