use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ExpiryStatus, Verdict};

/// Outcome of one validation pipeline run. 1:1 with the document —
/// re-validation supersedes the prior row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_type: String,
    pub type_confidence: f32,
    pub owner_confidence: f32,
    pub matched_employee_id: Option<Uuid>,
    pub expiry_date: Option<NaiveDate>,
    pub expiry_status: ExpiryStatus,
    pub authenticity_score: f32,
    pub is_duplicate: bool,
    pub compliance_score: f32,
    pub verdict: Verdict,
    /// Hard failures — any of these forces rejection.
    pub critical_issues: Vec<String>,
    /// Soft failures, retained for operator visibility.
    pub warnings: Vec<String>,
    pub model_name: String,
    pub validated_at: NaiveDateTime,
}
