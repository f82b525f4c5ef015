//! Queue worker: drains due jobs through the validation pipeline.
//!
//! Invoked periodically by an external trigger (cron, scheduler thread).
//! Each drained job runs the pipeline once, writes an audit row, and is
//! resolved as succeeded, requeued-with-backoff, or dead-lettered.

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use super::store;
use super::QueueError;
use crate::models::enums::{AuditOutcome, JobStatus, TriggeredBy};
use crate::models::AuditRecord;
use crate::pipeline::{DocumentValidator, ProviderError, ValidationError};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub visibility_timeout: Duration,
    pub max_attempts: i64,
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::minutes(crate::config::DEFAULT_VISIBILITY_TIMEOUT_MINUTES),
            max_attempts: crate::config::DEFAULT_MAX_ATTEMPTS,
            batch_size: 10,
        }
    }
}

/// What one worker pass did.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub claimed: usize,
    pub succeeded: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
}

/// Claim and run every due job once. Returns the pass summary.
pub fn run_due_jobs(
    conn: &Connection,
    validator: &DocumentValidator,
    now: NaiveDateTime,
    config: &WorkerConfig,
) -> Result<RunSummary, QueueError> {
    let jobs = store::claim_due_jobs(conn, now, config.visibility_timeout, config.batch_size)?;
    let mut summary = RunSummary {
        claimed: jobs.len(),
        ..RunSummary::default()
    };

    for job in jobs {
        let started = std::time::Instant::now();
        let outcome = validator.validate(conn, &job.document_id, now.date());
        let duration_ms = started.elapsed().as_millis() as i64;

        match outcome {
            Ok(_) => {
                write_audit(
                    conn,
                    &job.document_id,
                    Some(job.id),
                    AuditOutcome::Success,
                    duration_ms,
                    validator.model_name(),
                    None,
                    now,
                )?;
                store::mark_succeeded(conn, &job.id, now)?;
                summary.succeeded += 1;
            }
            Err(error) => {
                let message = error.to_string();
                write_audit(
                    conn,
                    &job.document_id,
                    Some(job.id),
                    AuditOutcome::Failure,
                    duration_ms,
                    validator.model_name(),
                    Some(&message),
                    now,
                )?;

                if let ValidationError::Provider(ProviderError::Auth(_)) = &error {
                    // Credential problems are never solved by retrying.
                    // Park the job and raise an account-level alert.
                    tracing::error!(
                        document_id = %job.document_id,
                        error = %message,
                        "Authorization failure, re-authorization required"
                    );
                    store::dead_letter(conn, &job, &message, now)?;
                    summary.dead_lettered += 1;
                    continue;
                }

                match store::fail_job(conn, &job, &message, config.max_attempts, now)? {
                    JobStatus::DeadLettered => summary.dead_lettered += 1,
                    _ => summary.requeued += 1,
                }
            }
        }
    }

    if summary.claimed > 0 {
        tracing::info!(
            claimed = summary.claimed,
            succeeded = summary.succeeded,
            requeued = summary.requeued,
            dead_lettered = summary.dead_lettered,
            "Queue worker pass finished"
        );
    }
    Ok(summary)
}

#[allow(clippy::too_many_arguments)]
fn write_audit(
    conn: &Connection,
    document_id: &Uuid,
    job_id: Option<Uuid>,
    outcome: AuditOutcome,
    duration_ms: i64,
    model_name: &str,
    error: Option<&str>,
    started_at: NaiveDateTime,
) -> Result<(), QueueError> {
    store::insert_audit(
        conn,
        &AuditRecord {
            id: Uuid::new_v4(),
            document_id: *document_id,
            job_id,
            triggered_by: TriggeredBy::Queue,
            outcome,
            duration_ms,
            model_name: Some(model_name.to_string()),
            error: error.map(String::from),
            started_at,
        },
    )
}
