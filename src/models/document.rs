use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{StorageProvider, ValidationStatus};

/// A stored inbound document. Immutable once written except for
/// `validation_status` and `request_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// At most one linked request; stays None when correlation found nothing.
    pub request_id: Option<Uuid>,
    pub filename: String,
    pub storage_provider: StorageProvider,
    pub storage_path: String,
    pub routing_rule_id: Option<Uuid>,
    /// SHA-256 of the stored bytes, base64-encoded.
    pub content_hash: String,
    pub sender_email: String,
    pub validation_status: ValidationStatus,
    pub received_at: NaiveDateTime,
}
