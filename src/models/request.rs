use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::RequestStatus;

/// An outstanding request for documents from a recipient.
///
/// The linked-document count is never stored here — it is always recomputed
/// from `documents` rows, so concurrent arrivals cannot corrupt it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    /// Document type the request asked for, if any (compliance input).
    pub requested_type: Option<String>,
    pub due_date: NaiveDate,
    pub expected_documents: i64,
    pub status: RequestStatus,
    pub status_changed_at: NaiveDateTime,
    pub status_changed_by: String,
    pub created_at: NaiveDateTime,
}

/// Append-only record of a status transition. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub old_status: RequestStatus,
    pub new_status: RequestStatus,
    pub actor: String,
    pub metadata: Option<String>,
    pub created_at: NaiveDateTime,
}
