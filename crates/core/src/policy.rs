//! Size-aware severity and verdict policy for return comparisons.
//!
//! One table drives both the live return path and the batch/reprocess path,
//! so the two can never classify the same score differently. All cutoffs are
//! similarity percentages in `0..=100`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Item size
// ---------------------------------------------------------------------------

/// Item-size hint recorded at borrow time; selects the threshold row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSize {
    Small,
    Medium,
    Large,
}

impl ItemSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemSize::Small => "small",
            ItemSize::Medium => "medium",
            ItemSize::Large => "large",
        }
    }

    /// Parse a stored size hint. Unknown or empty values fall back to `medium`,
    /// which is what inventory rows default to.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "small" => ItemSize::Small,
            "large" => ItemSize::Large,
            _ => ItemSize::Medium,
        }
    }

    /// Large items are never scored automatically; they go to manual review.
    pub fn requires_manual_review(self) -> bool {
        matches!(self, ItemSize::Large)
    }
}

// ---------------------------------------------------------------------------
// Severity / confidence
// ---------------------------------------------------------------------------

/// Coarse damage classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Parse a stored severity. Older rows use `minor` for what is now `low`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Severity::None),
            "low" | "minor" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }

    /// Whether a returned unit with this severity counts as damaged stock.
    pub fn is_damaging(self) -> bool {
        self > Severity::Low
    }
}

/// Qualitative agreement between the engine's sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceBand::Low => "low",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::High => "high",
        }
    }
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Verdict label attached to a comparison result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Good,
    FlaggedForManualCheck,
    MismatchSuspected,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Good => "good",
            Verdict::FlaggedForManualCheck => "flagged for manual check",
            Verdict::MismatchSuspected => "mismatch/damage suspected",
        }
    }
}

/// Outcome of the binary verify/flag/damage split used by the verification
/// state machine for automatic transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AutomaticOutcome {
    Verified,
    Flagged,
    Damage,
}

// ---------------------------------------------------------------------------
// Threshold table
// ---------------------------------------------------------------------------

/// Cutoffs for one item size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeThresholds {
    /// At or above: severity `none`, verdict good, auto-verify.
    pub high: f64,
    /// At or above (and below `high`): severity `medium`, flagged.
    pub mid: f64,
    /// Below: automatic outcome is `Damage` rather than `Flagged`.
    pub reject_floor: f64,
}

/// Per-size threshold table. Loaded from configuration or [`Default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub small: SizeThresholds,
    pub medium: SizeThresholds,
    pub large: SizeThresholds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            small: SizeThresholds {
                high: 95.0,
                mid: 85.0,
                reject_floor: 70.0,
            },
            medium: SizeThresholds {
                high: 92.0,
                mid: 82.0,
                reject_floor: 70.0,
            },
            large: SizeThresholds {
                high: 90.0,
                mid: 80.0,
                reject_floor: 70.0,
            },
        }
    }
}

impl ThresholdTable {
    pub fn for_size(&self, size: ItemSize) -> SizeThresholds {
        match size {
            ItemSize::Small => self.small,
            ItemSize::Medium => self.medium,
            ItemSize::Large => self.large,
        }
    }

    /// Reject tables whose bands overlap, fall outside `0..=100`, or loosen
    /// the policy for smaller items.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, row) in [
            ("small", self.small),
            ("medium", self.medium),
            ("large", self.large),
        ] {
            for value in [row.high, row.mid, row.reject_floor] {
                if !(0.0..=100.0).contains(&value) {
                    return Err(CoreError::PreconditionFailed(format!(
                        "Threshold for '{name}' must be between 0 and 100, got {value}"
                    )));
                }
            }
            if !(row.high > row.mid && row.mid > row.reject_floor) {
                return Err(CoreError::PreconditionFailed(format!(
                    "Thresholds for '{name}' must satisfy high > mid > reject_floor"
                )));
            }
        }

        if self.small.high < self.medium.high
            || self.medium.high < self.large.high
            || self.small.mid < self.medium.mid
            || self.medium.mid < self.large.mid
        {
            return Err(CoreError::PreconditionFailed(
                "Thresholds must be strictest for small items and loosest for large items"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Map a similarity score to severity and verdict for the given size.
    pub fn classify(&self, similarity: f64, size: ItemSize) -> (Severity, Verdict) {
        let row = self.for_size(size);
        if similarity >= row.high {
            (Severity::None, Verdict::Good)
        } else if similarity >= row.mid {
            (Severity::Medium, Verdict::FlaggedForManualCheck)
        } else {
            (Severity::High, Verdict::MismatchSuspected)
        }
    }

    /// The automatic verification outcome for a score.
    pub fn automatic_outcome(&self, similarity: f64, size: ItemSize) -> AutomaticOutcome {
        let row = self.for_size(size);
        if similarity >= row.high {
            AutomaticOutcome::Verified
        } else if similarity >= row.reject_floor {
            AutomaticOutcome::Flagged
        } else {
            AutomaticOutcome::Damage
        }
    }
}

/// Minimum gap between a new score and a previously recorded offline score
/// that triggers a mismatch warning.
pub const SCORE_MISMATCH_GAP: f64 = 20.0;

/// Whether a fresh score disagrees with an earlier offline score enough to
/// warrant a human look.
pub fn detect_score_mismatch(offline: Option<f64>, fresh: f64) -> bool {
    offline.is_some_and(|previous| (previous - fresh).abs() >= SCORE_MISMATCH_GAP)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SIZES: [ItemSize; 3] = [ItemSize::Small, ItemSize::Medium, ItemSize::Large];

    #[test]
    fn default_table_is_valid() {
        assert!(ThresholdTable::default().validate().is_ok());
    }

    #[test]
    fn scores_above_high_are_severity_none() {
        let table = ThresholdTable::default();
        for size in SIZES {
            let high = table.for_size(size).high;
            for score in [high + 0.01, high + 2.5, 100.0] {
                assert_eq!(table.classify(score, size).0, Severity::None, "{size:?} {score}");
            }
        }
    }

    #[test]
    fn scores_below_mid_are_severity_high() {
        let table = ThresholdTable::default();
        for size in SIZES {
            let mid = table.for_size(size).mid;
            for score in [mid - 0.01, mid - 10.0, 0.0] {
                assert_eq!(table.classify(score, size).0, Severity::High, "{size:?} {score}");
            }
        }
    }

    #[test]
    fn mid_band_is_flagged_medium() {
        let table = ThresholdTable::default();
        let (severity, verdict) = table.classify(90.0, ItemSize::Small);
        assert_eq!(severity, Severity::Medium);
        assert_eq!(verdict, Verdict::FlaggedForManualCheck);
    }

    #[test]
    fn small_items_are_strictest() {
        let table = ThresholdTable::default();
        // 93 passes for medium but not for small.
        assert_eq!(table.classify(93.0, ItemSize::Medium).0, Severity::None);
        assert_eq!(table.classify(93.0, ItemSize::Small).0, Severity::Medium);
    }

    #[test]
    fn automatic_outcome_uses_reject_floor() {
        let table = ThresholdTable::default();
        assert_eq!(table.automatic_outcome(99.0, ItemSize::Small), AutomaticOutcome::Verified);
        assert_eq!(table.automatic_outcome(75.0, ItemSize::Small), AutomaticOutcome::Flagged);
        assert_eq!(table.automatic_outcome(40.0, ItemSize::Small), AutomaticOutcome::Damage);
    }

    #[test]
    fn validate_rejects_overlapping_bands() {
        let mut table = ThresholdTable::default();
        table.medium.mid = table.medium.high;
        assert_matches!(table.validate(), Err(CoreError::PreconditionFailed(_)));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let mut table = ThresholdTable::default();
        table.small.high = 101.0;
        assert!(table.validate().is_err());
    }

    #[test]
    fn validate_rejects_looser_small_than_large() {
        let mut table = ThresholdTable::default();
        table.small = SizeThresholds {
            high: 85.0,
            mid: 75.0,
            reject_floor: 60.0,
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn severity_parse_accepts_legacy_minor() {
        assert_eq!(Severity::parse("minor"), Some(Severity::Low));
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn damaging_starts_above_low() {
        assert!(!Severity::None.is_damaging());
        assert!(!Severity::Low.is_damaging());
        assert!(Severity::Medium.is_damaging());
        assert!(Severity::High.is_damaging());
    }

    #[test]
    fn item_size_falls_back_to_medium() {
        assert_eq!(ItemSize::parse_lenient("LARGE"), ItemSize::Large);
        assert_eq!(ItemSize::parse_lenient(""), ItemSize::Medium);
        assert!(ItemSize::Large.requires_manual_review());
        assert!(!ItemSize::Small.requires_manual_review());
    }

    #[test]
    fn score_mismatch_needs_offline_score() {
        assert!(!detect_score_mismatch(None, 10.0));
        assert!(detect_score_mismatch(Some(90.0), 65.0));
        assert!(!detect_score_mismatch(Some(90.0), 80.0));
    }
}
