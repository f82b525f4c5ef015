use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditOutcome, JobStatus, TriggeredBy};

/// A deferred validation run. queued → processing → (succeeded |
/// queued-with-backoff | dead_lettered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationJob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub status: JobStatus,
    pub attempt_count: i64,
    pub next_attempt_at: NaiveDateTime,
    /// Set while processing; a stale claim makes the job reclaimable.
    pub claimed_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
}

/// A job parked after exhausting its retry budget, kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub attempt_count: i64,
    pub last_error: String,
    pub created_at: NaiveDateTime,
}

/// One row per pipeline attempt — the queue's observability surface and
/// the counter source for the manual-trigger rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub job_id: Option<Uuid>,
    pub triggered_by: TriggeredBy,
    pub outcome: AuditOutcome,
    pub duration_ms: i64,
    pub model_name: Option<String>,
    pub error: Option<String>,
    pub started_at: NaiveDateTime,
}
