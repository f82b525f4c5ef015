use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Routing rule: sender/subject patterns plus a storage target and folder
/// template. Patterns use `*` wildcards (`*@acme.com`). Higher priority
/// wins; created_at breaks ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sender_pattern: String,
    pub subject_pattern: String,
    pub priority: i64,
    pub storage_target_id: Uuid,
    /// Supports {sender}, {date}, {year}, {month}, {employee}, {request_id}.
    pub folder_template: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
}
