//! Comparison job payload and queue conventions.

use serde::{Deserialize, Serialize};

use crate::policy::{ItemSize, Severity};

/// Default queue priority. Lower values are claimed first.
pub const DEFAULT_PRIORITY: i16 = 5;

/// Priority used for jobs created by a live return event, so a student
/// standing at the kiosk is served before a bulk backfill.
pub const RETURN_EVENT_PRIORITY: i16 = 3;

/// Priority for operator-triggered reprocess runs.
pub const REPROCESS_PRIORITY: i16 = 7;

/// Snapshot taken at enqueue time. Relative photo paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPayload {
    pub reference_path: String,
    pub return_path: String,
    pub item_size: ItemSize,
    /// Score already on the transaction when the job was queued, kept for audit.
    #[serde(default)]
    pub offline_similarity: Option<f64>,
    #[serde(default)]
    pub offline_severity: Option<Severity>,
    /// Created by an explicit reprocess run.
    #[serde(default)]
    pub reprocess: bool,
}

/// How a comparison came to be run; recorded in the metadata side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Sweep,
    Reprocess,
    Inline,
}

impl RunKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::Sweep => "sweep",
            RunKind::Reprocess => "reprocess",
            RunKind::Inline => "inline",
        }
    }
}
