//! Decision engine: fold the stage scores into a verdict against the
//! organization's thresholds.

use crate::models::enums::{ExpiryStatus, Verdict};
use crate::models::Organization;

/// Everything the verdict depends on.
#[derive(Debug)]
pub struct DecisionInput<'a> {
    pub owner_confidence: f32,
    pub authenticity_score: f32,
    pub compliance_score: f32,
    pub expiry_status: ExpiryStatus,
    /// True when the originating request named a type, so a zero
    /// compliance score is a real mismatch rather than a missing signal.
    pub type_was_requested: bool,
    pub critical_issues: &'a [String],
}

/// Combine stage outputs into a verdict.
///
/// Rejected: any critical issue, or a clear compliance mismatch.
/// Verified: every threshold clears and the document is not
/// expired-and-disallowed. Anything borderline lands in needs_review for a
/// human.
pub fn decide(org: &Organization, input: &DecisionInput<'_>) -> Verdict {
    if !input.critical_issues.is_empty() {
        return Verdict::Rejected;
    }
    if input.type_was_requested && input.compliance_score == 0.0 {
        return Verdict::Rejected;
    }
    if input.expiry_status == ExpiryStatus::Expired && !org.allow_expired {
        return Verdict::NeedsReview;
    }

    let clears = input.owner_confidence >= org.owner_threshold
        && input.authenticity_score >= org.authenticity_threshold
        && input.compliance_score >= org.compliance_threshold;
    if clears {
        Verdict::Verified
    } else {
        Verdict::NeedsReview
    }
}
