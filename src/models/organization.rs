use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization owning requests, documents and routing rules.
/// Carries the decision-engine thresholds and validation policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub owner_threshold: f32,
    pub authenticity_threshold: f32,
    pub compliance_threshold: f32,
    /// When set, a duplicate content hash is a hard failure, not a warning.
    pub strict_duplicates: bool,
    /// When set, an expired document may still auto-approve.
    pub allow_expired: bool,
    /// Days past the due date before the expiry sweep marks a request expired.
    pub expiry_grace_days: i64,
    pub created_at: NaiveDateTime,
}
