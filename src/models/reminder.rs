use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduled renewal nudge derived from a detected expiry date.
/// UNIQUE(document_id, reminder_date) makes re-validation idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewalReminder {
    pub id: Uuid,
    pub document_id: Uuid,
    pub reminder_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub sent: bool,
    pub sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}
