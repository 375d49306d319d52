//! Domain logic for the kiosk return-verification pipeline.
//!
//! Nothing in this crate touches the database or the async runtime.

pub mod comparison_job;
pub mod error;
pub mod inventory;
pub mod photo;
pub mod policy;
pub mod similarity;
pub mod types;
pub mod verification;

/// Message shown while a comparison is queued or running.
pub const MSG_ANALYZING: &str = "Analyzing Equipment for damages";

// Manual-review messages below are written to both `ai_analysis_message`
// and `detected_issues`.

/// Large items skip the comparison and always go to an admin.
pub const MSG_MANUAL_REVIEW_LARGE: &str = "Manual review required (large item).";

/// No borrow-time photo on record, or its file is gone.
pub const MSG_MANUAL_REVIEW_NO_REFERENCE: &str =
    "Manual review required (reference photo unavailable).";

/// A claimed job ended in `failed`.
pub const MSG_COMPARISON_FAILED: &str = "Comparison failed - manual review required.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_review_messages_are_distinct() {
        let messages = [
            MSG_MANUAL_REVIEW_LARGE,
            MSG_MANUAL_REVIEW_NO_REFERENCE,
            MSG_COMPARISON_FAILED,
        ];
        for (i, a) in messages.iter().enumerate() {
            assert!(a.to_lowercase().contains("manual review"), "{a}");
            assert!(a.ends_with('.'), "{a}");
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(!messages.contains(&MSG_ANALYZING));
    }
}
