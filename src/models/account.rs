use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connected mailbox. `last_cursor` is the persisted "last processed"
/// position, advanced only via a conditional write after a successful batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailAccount {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub address: String,
    pub last_cursor: Option<String>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}
