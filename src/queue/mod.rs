//! Resilience queue: deferred validation runs with retry, backoff and a
//! dead-letter store.
//!
//! Jobs are claimed with a visibility timeout so a crashed worker's claim
//! expires and the job becomes reclaimable. Every attempt writes an audit
//! row; the audit trail is this subsystem's observability surface.

pub mod store;
pub mod worker;

pub use worker::{run_due_jobs, RunSummary, WorkerConfig};

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),
}
