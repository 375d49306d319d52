//! Transaction verification state machine.
//!
//! Pure planning only: callers pass the current row state and an explicit
//! [`ActorContext`], and receive the complete set of field changes to apply
//! atomically. No clock or session is read here.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::policy::{AutomaticOutcome, ItemSize, Severity};
use crate::types::{DbId, Timestamp};

/// Maximum length of admin notes attached to a single action.
pub const MAX_NOTES_LEN: usize = 2000;

/// Separator between appended audit-note fragments.
pub const NOTES_SEPARATOR: &str = " | ";

pub const MSG_NOT_RETURNED: &str = "Cannot verify/flag/reject an item that has not been returned yet.";
pub const MSG_NOTES_REQUIRED: &str = "Please provide notes for this action.";
pub const MSG_BORROW_ONLY: &str = "Only borrow transactions can be verified.";

// ---------------------------------------------------------------------------
// Status vocabularies
// ---------------------------------------------------------------------------

/// Stored `return_verification_status` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[serde(rename = "Not Yet Returned")]
    NotYetReturned,
    Pending,
    Analyzing,
    Verified,
    Flagged,
    Damage,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotYetReturned => "Not Yet Returned",
            Self::Pending => "Pending",
            Self::Analyzing => "Analyzing",
            Self::Verified => "Verified",
            Self::Flagged => "Flagged",
            Self::Damage => "Damage",
            Self::Rejected => "Rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Not Yet Returned" => Some(Self::NotYetReturned),
            "Pending" => Some(Self::Pending),
            "Analyzing" => Some(Self::Analyzing),
            "Verified" => Some(Self::Verified),
            "Flagged" => Some(Self::Flagged),
            "Damage" => Some(Self::Damage),
            "Rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Parse a stored value, treating unknown or missing values as `Pending`.
    pub fn parse_or_pending(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or(Self::Pending)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Verified | Self::Flagged | Self::Damage | Self::Rejected
        )
    }
}

/// `return_review_status` values.
pub mod review {
    pub const PENDING: &str = "Pending";
    pub const PENDING_REVIEW: &str = "Pending Review";
    pub const VERIFIED: &str = "Verified";
    pub const FLAGGED: &str = "Flagged";
    pub const DAMAGE: &str = "Damage";
    pub const REJECTED: &str = "Rejected";
    pub const MANUAL_REVIEW_REQUIRED: &str = "Manual Review Required";
    pub const REVIEW_REQUIRED: &str = "Review Required";
}

/// Operational `status` values this subsystem reads or writes.
pub mod operational {
    pub const ACTIVE: &str = "Active";
    pub const PENDING_REVIEW: &str = "Pending Review";
    pub const RETURNED: &str = "Returned";
    pub const REJECTED: &str = "Rejected";

    pub(crate) fn is_one_of(current: &str, candidates: &[&str]) -> bool {
        candidates
            .iter()
            .any(|c| c.eq_ignore_ascii_case(current.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Borrow,
    Return,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Borrow => "Borrow",
            Self::Return => "Return",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "borrow" => Some(Self::Borrow),
            "return" => Some(Self::Return),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Admin actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminAction {
    Verify,
    Flag,
    Reject,
}

impl AdminAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Flag => "flag",
            Self::Reject => "reject",
        }
    }

    pub fn requires_notes(self) -> bool {
        !matches!(self, Self::Verify)
    }
}

/// Who is acting, and when. Passed explicitly into every transition.
#[derive(Debug, Clone)]
pub struct ActorContext {
    pub actor_id: DbId,
    pub actor_name: String,
    pub now: Timestamp,
}

/// The slice of a transaction row the state machine reads.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub transaction_type: TransactionType,
    pub status: String,
    pub verification_status: VerificationStatus,
    pub severity: Option<Severity>,
    pub notes: Option<String>,
    pub processed_by: Option<DbId>,
    pub inventory_settled: bool,
}

/// Inventory adjustment to apply alongside a verify decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventorySettlement {
    /// The unit goes to damaged stock instead of back to available.
    pub damaged: bool,
}

/// Every field change produced by an admin action.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminDecision {
    pub action: AdminAction,
    pub status: String,
    pub verification_status: VerificationStatus,
    pub review_status: &'static str,
    pub notes: String,
    pub processed_by: DbId,
    pub processed_at: Timestamp,
    pub settlement: Option<InventorySettlement>,
    pub message: &'static str,
}

/// Validate an admin action against the current state and plan its effects.
pub fn plan_admin_action(
    state: &TransactionState,
    action: AdminAction,
    notes: Option<&str>,
    ctx: &ActorContext,
) -> Result<AdminDecision, CoreError> {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    if action.requires_notes() && notes.is_none() {
        return Err(CoreError::PreconditionFailed(MSG_NOTES_REQUIRED.to_string()));
    }
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(CoreError::PreconditionFailed(format!(
            "Notes must be at most {MAX_NOTES_LEN} characters."
        )));
    }
    if state.transaction_type != TransactionType::Borrow {
        return Err(CoreError::PreconditionFailed(MSG_BORROW_ONLY.to_string()));
    }
    if state.verification_status == VerificationStatus::NotYetReturned {
        return Err(CoreError::PreconditionFailed(MSG_NOT_RETURNED.to_string()));
    }

    let current = state.status.as_str();
    let admin = ctx.actor_name.trim();

    let (verification_status, review_status, status, fragment, message) = match action {
        AdminAction::Verify => {
            let status = if operational::is_one_of(
                current,
                &[
                    operational::ACTIVE,
                    operational::PENDING_REVIEW,
                    operational::RETURNED,
                ],
            ) {
                operational::RETURNED.to_string()
            } else {
                current.to_string()
            };
            let fragment = match notes {
                Some(n) => format!("Return verified by Admin {admin}: {n}"),
                None => format!("Return verified by Admin {admin}."),
            };
            (
                VerificationStatus::Verified,
                review::VERIFIED,
                status,
                fragment,
                "Return verified successfully.",
            )
        }
        AdminAction::Flag => {
            let status = if operational::is_one_of(
                current,
                &[operational::ACTIVE, operational::PENDING_REVIEW],
            ) {
                operational::PENDING_REVIEW.to_string()
            } else {
                current.to_string()
            };
            (
                VerificationStatus::Flagged,
                review::PENDING,
                status,
                format!("Return flagged by Admin {admin}: {}", notes.unwrap_or_default()),
                "Return flagged for additional review.",
            )
        }
        AdminAction::Reject => (
            VerificationStatus::Rejected,
            review::REJECTED,
            operational::REJECTED.to_string(),
            format!("Return rejected by Admin {admin}: {}", notes.unwrap_or_default()),
            "Return rejected.",
        ),
    };

    let settlement = (action == AdminAction::Verify && !state.inventory_settled).then(|| {
        InventorySettlement {
            damaged: state.severity.is_some_and(Severity::is_damaging),
        }
    });

    Ok(AdminDecision {
        action,
        status,
        verification_status,
        review_status,
        notes: append_note(state.notes.as_deref(), &fragment),
        processed_by: ctx.actor_id,
        processed_at: ctx.now,
        settlement,
        message,
    })
}

/// Append an audit fragment without discarding existing notes.
pub fn append_note(existing: Option<&str>, fragment: &str) -> String {
    let existing = existing.map(str::trim).unwrap_or_default();
    let fragment = fragment.trim();
    match (existing.is_empty(), fragment.is_empty()) {
        (true, _) => fragment.to_string(),
        (false, true) => existing.to_string(),
        (false, false) => format!("{existing}{NOTES_SEPARATOR}{fragment}"),
    }
}

// ---------------------------------------------------------------------------
// Automatic transitions
// ---------------------------------------------------------------------------

/// Status fields written when a comparison job completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomaticDecision {
    pub verification_status: VerificationStatus,
    pub review_status: &'static str,
}

/// Map an automatic outcome to stored statuses. Only small items skip the
/// human review pass after a passing score.
pub fn automatic_decision(outcome: AutomaticOutcome, size: ItemSize) -> AutomaticDecision {
    match outcome {
        AutomaticOutcome::Verified => AutomaticDecision {
            verification_status: VerificationStatus::Verified,
            review_status: if size == ItemSize::Small {
                review::VERIFIED
            } else {
                review::PENDING_REVIEW
            },
        },
        AutomaticOutcome::Flagged => AutomaticDecision {
            verification_status: VerificationStatus::Flagged,
            review_status: review::FLAGGED,
        },
        AutomaticOutcome::Damage => AutomaticDecision {
            verification_status: VerificationStatus::Damage,
            review_status: review::DAMAGE,
        },
    }
}

/// Whether a completed comparison may still change the verification fields.
///
/// Admin decisions are final for automatic results. A previous automatic
/// verdict can only be replaced by an explicit reprocess run.
pub fn accepts_automatic(
    verification_status: VerificationStatus,
    processed_by: Option<DbId>,
    reprocess: bool,
) -> bool {
    if processed_by.is_some() {
        return false;
    }
    match verification_status {
        VerificationStatus::Pending | VerificationStatus::Analyzing => true,
        VerificationStatus::Verified | VerificationStatus::Flagged | VerificationStatus::Damage => {
            reprocess
        }
        VerificationStatus::NotYetReturned | VerificationStatus::Rejected => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn ctx() -> ActorContext {
        ActorContext {
            actor_id: 7,
            actor_name: "Reyes".to_string(),
            now: Utc::now(),
        }
    }

    fn returned(status: &str) -> TransactionState {
        TransactionState {
            transaction_type: TransactionType::Borrow,
            status: status.to_string(),
            verification_status: VerificationStatus::Pending,
            severity: Some(Severity::None),
            notes: Some("Borrowed for lab 3".to_string()),
            processed_by: None,
            inventory_settled: false,
        }
    }

    #[test]
    fn verify_not_yet_returned_fails_fast() {
        let mut state = returned(operational::ACTIVE);
        state.verification_status = VerificationStatus::NotYetReturned;
        let err = plan_admin_action(&state, AdminAction::Verify, None, &ctx()).unwrap_err();
        assert_matches!(err, CoreError::PreconditionFailed(ref m) if m == MSG_NOT_RETURNED);
    }

    #[test]
    fn flag_and_reject_require_notes() {
        let state = returned(operational::PENDING_REVIEW);
        for action in [AdminAction::Flag, AdminAction::Reject] {
            for notes in [None, Some(""), Some("   ")] {
                let err = plan_admin_action(&state, action, notes, &ctx()).unwrap_err();
                assert_matches!(err, CoreError::PreconditionFailed(ref m) if m == MSG_NOTES_REQUIRED);
            }
        }
    }

    #[test]
    fn overlong_notes_are_rejected() {
        let state = returned(operational::PENDING_REVIEW);
        let notes = "x".repeat(MAX_NOTES_LEN + 1);
        assert!(plan_admin_action(&state, AdminAction::Flag, Some(&notes), &ctx()).is_err());
    }

    #[test]
    fn return_rows_cannot_be_verified() {
        let mut state = returned(operational::ACTIVE);
        state.transaction_type = TransactionType::Return;
        let err = plan_admin_action(&state, AdminAction::Verify, None, &ctx()).unwrap_err();
        assert_matches!(err, CoreError::PreconditionFailed(ref m) if m == MSG_BORROW_ONLY);
    }

    #[test]
    fn verify_returns_item_and_settles_inventory() {
        let decision =
            plan_admin_action(&returned(operational::PENDING_REVIEW), AdminAction::Verify, None, &ctx())
                .unwrap();
        assert_eq!(decision.verification_status, VerificationStatus::Verified);
        assert_eq!(decision.review_status, review::VERIFIED);
        assert_eq!(decision.status, operational::RETURNED);
        assert_eq!(decision.settlement, Some(InventorySettlement { damaged: false }));
        assert_eq!(
            decision.notes,
            "Borrowed for lab 3 | Return verified by Admin Reyes."
        );
        assert_eq!(decision.processed_by, 7);
    }

    #[test]
    fn verify_with_damaging_severity_moves_unit_to_damaged() {
        let mut state = returned(operational::ACTIVE);
        state.severity = Some(Severity::High);
        let decision = plan_admin_action(&state, AdminAction::Verify, None, &ctx()).unwrap();
        assert_eq!(decision.settlement, Some(InventorySettlement { damaged: true }));
    }

    #[test]
    fn verify_twice_settles_once() {
        let mut state = returned(operational::RETURNED);
        state.inventory_settled = true;
        let decision = plan_admin_action(&state, AdminAction::Verify, None, &ctx()).unwrap();
        assert_eq!(decision.settlement, None);
    }

    #[test]
    fn flag_appends_note_and_keeps_review_pending() {
        let decision = plan_admin_action(
            &returned(operational::ACTIVE),
            AdminAction::Flag,
            Some("  cracked lens cap "),
            &ctx(),
        )
        .unwrap();
        assert_eq!(decision.verification_status, VerificationStatus::Flagged);
        assert_eq!(decision.review_status, review::PENDING);
        assert_eq!(decision.status, operational::PENDING_REVIEW);
        assert_eq!(
            decision.notes,
            "Borrowed for lab 3 | Return flagged by Admin Reyes: cracked lens cap"
        );
        assert_eq!(decision.settlement, None);
    }

    #[test]
    fn flag_leaves_unrelated_operational_status_alone() {
        let decision =
            plan_admin_action(&returned("Overdue"), AdminAction::Flag, Some("late"), &ctx()).unwrap();
        assert_eq!(decision.status, "Overdue");
    }

    #[test]
    fn reject_always_rejects() {
        let decision = plan_admin_action(
            &returned(operational::RETURNED),
            AdminAction::Reject,
            Some("wrong item"),
            &ctx(),
        )
        .unwrap();
        assert_eq!(decision.verification_status, VerificationStatus::Rejected);
        assert_eq!(decision.review_status, review::REJECTED);
        assert_eq!(decision.status, operational::REJECTED);
    }

    #[test]
    fn append_note_handles_empty_sides() {
        assert_eq!(append_note(None, "a"), "a");
        assert_eq!(append_note(Some("  "), "a"), "a");
        assert_eq!(append_note(Some("old"), ""), "old");
        assert_eq!(append_note(Some("old "), "new"), "old | new");
    }

    #[test]
    fn only_small_items_auto_resolve_review() {
        let small = automatic_decision(AutomaticOutcome::Verified, ItemSize::Small);
        assert_eq!(small.review_status, review::VERIFIED);
        let medium = automatic_decision(AutomaticOutcome::Verified, ItemSize::Medium);
        assert_eq!(medium.verification_status, VerificationStatus::Verified);
        assert_eq!(medium.review_status, review::PENDING_REVIEW);
        let damage = automatic_decision(AutomaticOutcome::Damage, ItemSize::Small);
        assert_eq!(damage.verification_status, VerificationStatus::Damage);
    }

    #[test]
    fn admin_decisions_are_final_for_automatic_results() {
        for status in [
            VerificationStatus::Verified,
            VerificationStatus::Damage,
            VerificationStatus::Rejected,
            VerificationStatus::Flagged,
            VerificationStatus::Pending,
        ] {
            assert!(!accepts_automatic(status, Some(1), true), "{status:?}");
        }
    }

    #[test]
    fn automatic_results_replace_each_other_only_on_reprocess() {
        assert!(accepts_automatic(VerificationStatus::Analyzing, None, false));
        assert!(accepts_automatic(VerificationStatus::Pending, None, false));
        assert!(!accepts_automatic(VerificationStatus::Verified, None, false));
        assert!(accepts_automatic(VerificationStatus::Verified, None, true));
        assert!(!accepts_automatic(VerificationStatus::Rejected, None, true));
        assert!(!accepts_automatic(VerificationStatus::NotYetReturned, None, true));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            VerificationStatus::NotYetReturned,
            VerificationStatus::Pending,
            VerificationStatus::Analyzing,
            VerificationStatus::Verified,
            VerificationStatus::Flagged,
            VerificationStatus::Damage,
            VerificationStatus::Rejected,
        ] {
            assert_eq!(VerificationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VerificationStatus::parse_or_pending(None), VerificationStatus::Pending);
    }
}
