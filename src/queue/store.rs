//! Persistence for validation jobs, dead letters and the attempt audit
//! trail.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::QueueError;
use crate::db::repository::{fmt_ts, parse_ts};
use crate::db::DatabaseError;
use crate::models::enums::JobStatus;
use crate::models::{AuditRecord, DeadLetterEntry, ValidationJob};

/// Retry delays in minutes, applied in order: 1m, 5m, 15m, 1h, 6h, 24h.
pub const BACKOFF_MINUTES: [i64; 6] = [1, 5, 15, 60, 360, 1440];

/// Delay before the next attempt, given how many attempts have run.
pub fn backoff_delay(attempts_so_far: i64) -> Duration {
    let idx = (attempts_so_far.max(1) as usize - 1).min(BACKOFF_MINUTES.len() - 1);
    Duration::minutes(BACKOFF_MINUTES[idx])
}

/// Queue a validation run for a document, due immediately.
pub fn enqueue(
    conn: &Connection,
    document_id: &Uuid,
    now: NaiveDateTime,
) -> Result<ValidationJob, QueueError> {
    let job = ValidationJob {
        id: Uuid::new_v4(),
        document_id: *document_id,
        status: JobStatus::Queued,
        attempt_count: 0,
        next_attempt_at: now,
        claimed_at: None,
        last_error: None,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO validation_jobs
         (id, document_id, status, attempt_count, next_attempt_at, claimed_at, last_error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6)",
        params![
            job.id.to_string(),
            job.document_id.to_string(),
            job.status.as_str(),
            job.attempt_count,
            fmt_ts(job.next_attempt_at),
            fmt_ts(job.created_at),
        ],
    )
    .map_err(DatabaseError::from)?;

    tracing::debug!(job_id = %job.id, document_id = %document_id, "Validation job enqueued");
    Ok(job)
}

pub fn get_job(conn: &Connection, id: &Uuid) -> Result<Option<ValidationJob>, QueueError> {
    let result = conn.query_row(
        "SELECT id, document_id, status, attempt_count, next_attempt_at, claimed_at, last_error, created_at
         FROM validation_jobs WHERE id = ?1",
        params![id.to_string()],
        job_row,
    );

    match result {
        Ok(row) => Ok(Some(job_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e).into()),
    }
}

/// Claim up to `limit` due jobs, incrementing their attempt count.
///
/// The claim is an atomic conditional update: it succeeds only while the
/// job is still `queued` and due, or while a previous processing claim has
/// outlived the visibility timeout. Two workers can never both claim the
/// same job.
pub fn claim_due_jobs(
    conn: &Connection,
    now: NaiveDateTime,
    visibility_timeout: Duration,
    limit: usize,
) -> Result<Vec<ValidationJob>, QueueError> {
    let stale_before = now - visibility_timeout;

    let mut stmt = conn
        .prepare(
            "SELECT id FROM validation_jobs
             WHERE (status = 'queued' AND next_attempt_at <= ?1)
                OR (status = 'processing' AND claimed_at <= ?2)
             ORDER BY next_attempt_at ASC
             LIMIT ?3",
        )
        .map_err(DatabaseError::from)?;
    let candidate_ids: Vec<String> = stmt
        .query_map(
            params![fmt_ts(now), fmt_ts(stale_before), limit as i64],
            |row| row.get(0),
        )
        .map_err(DatabaseError::from)?
        .collect::<Result<_, _>>()
        .map_err(DatabaseError::from)?;

    let mut claimed = Vec::new();
    for id in candidate_ids {
        let updated = conn
            .execute(
                "UPDATE validation_jobs
                 SET status = 'processing', claimed_at = ?2, attempt_count = attempt_count + 1
                 WHERE id = ?1
                   AND ((status = 'queued' AND next_attempt_at <= ?2)
                     OR (status = 'processing' AND claimed_at <= ?3))",
                params![id, fmt_ts(now), fmt_ts(stale_before)],
            )
            .map_err(DatabaseError::from)?;
        if updated != 1 {
            continue; // lost the race to another worker
        }

        let job_id = parse_id(&id)?;
        if let Some(job) = get_job(conn, &job_id)? {
            claimed.push(job);
        }
    }
    Ok(claimed)
}

pub fn mark_succeeded(
    conn: &Connection,
    job_id: &Uuid,
    now: NaiveDateTime,
) -> Result<(), QueueError> {
    let updated = conn
        .execute(
            "UPDATE validation_jobs
             SET status = 'succeeded', claimed_at = ?2, last_error = NULL
             WHERE id = ?1",
            params![job_id.to_string(), fmt_ts(now)],
        )
        .map_err(DatabaseError::from)?;
    if updated == 0 {
        return Err(QueueError::JobNotFound(*job_id));
    }
    Ok(())
}

/// Record a failed attempt: requeue with backoff while the attempt budget
/// lasts, otherwise move the job to the dead-letter store. Returns the
/// job's new status.
pub fn fail_job(
    conn: &Connection,
    job: &ValidationJob,
    error: &str,
    max_attempts: i64,
    now: NaiveDateTime,
) -> Result<JobStatus, QueueError> {
    if job.attempt_count >= max_attempts {
        dead_letter(conn, job, error, now)?;
        return Ok(JobStatus::DeadLettered);
    }

    let delay = backoff_delay(job.attempt_count);
    conn.execute(
        "UPDATE validation_jobs
         SET status = 'queued', claimed_at = NULL, last_error = ?2, next_attempt_at = ?3
         WHERE id = ?1",
        params![job.id.to_string(), error, fmt_ts(now + delay)],
    )
    .map_err(DatabaseError::from)?;

    tracing::warn!(
        job_id = %job.id,
        attempt = job.attempt_count,
        delay_minutes = delay.num_minutes(),
        error,
        "Validation attempt failed, requeued with backoff"
    );
    Ok(JobStatus::Queued)
}

/// Park a job in the dead-letter store with its last error. The unique
/// constraint on job_id makes this exactly-once even if called twice.
pub fn dead_letter(
    conn: &Connection,
    job: &ValidationJob,
    error: &str,
    now: NaiveDateTime,
) -> Result<(), QueueError> {
    conn.execute(
        "UPDATE validation_jobs SET status = 'dead_lettered', last_error = ?2 WHERE id = ?1",
        params![job.id.to_string(), error],
    )
    .map_err(DatabaseError::from)?;

    conn.execute(
        "INSERT OR IGNORE INTO dead_letters
         (id, job_id, document_id, attempt_count, last_error, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            job.id.to_string(),
            job.document_id.to_string(),
            job.attempt_count,
            error,
            fmt_ts(now),
        ],
    )
    .map_err(DatabaseError::from)?;

    tracing::error!(
        job_id = %job.id,
        document_id = %job.document_id,
        attempts = job.attempt_count,
        error,
        "Validation job dead-lettered"
    );
    Ok(())
}

pub fn list_dead_letters(conn: &Connection) -> Result<Vec<DeadLetterEntry>, QueueError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, job_id, document_id, attempt_count, last_error, created_at
             FROM dead_letters ORDER BY created_at ASC",
        )
        .map_err(DatabaseError::from)?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(DatabaseError::from)?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, job_id, document_id, attempt_count, last_error, created_at) =
            row.map_err(DatabaseError::from)?;
        entries.push(DeadLetterEntry {
            id: parse_id(&id)?,
            job_id: parse_id(&job_id)?,
            document_id: parse_id(&document_id)?,
            attempt_count,
            last_error,
            created_at: parse_ts(&created_at),
        });
    }
    Ok(entries)
}

pub fn insert_audit(conn: &Connection, record: &AuditRecord) -> Result<(), QueueError> {
    conn.execute(
        "INSERT INTO validation_audit
         (id, document_id, job_id, triggered_by, outcome, duration_ms, model_name, error, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.id.to_string(),
            record.document_id.to_string(),
            record.job_id.map(|id| id.to_string()),
            record.triggered_by.as_str(),
            record.outcome.as_str(),
            record.duration_ms,
            record.model_name,
            record.error,
            fmt_ts(record.started_at),
        ],
    )
    .map_err(DatabaseError::from)?;
    Ok(())
}

/// Manual-trigger attempts for a document since a cutoff. Feeds the
/// rate-limit window.
pub fn count_manual_audits_since(
    conn: &Connection,
    document_id: &Uuid,
    since: NaiveDateTime,
) -> Result<i64, QueueError> {
    let count = conn
        .query_row(
            "SELECT COUNT(*) FROM validation_audit
             WHERE document_id = ?1 AND triggered_by = 'manual' AND started_at >= ?2",
            params![document_id.to_string(), fmt_ts(since)],
            |row| row.get(0),
        )
        .map_err(DatabaseError::from)?;
    Ok(count)
}

pub fn list_audit_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<AuditRecord>, QueueError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, document_id, job_id, triggered_by, outcome, duration_ms, model_name, error, started_at
             FROM validation_audit WHERE document_id = ?1 ORDER BY started_at ASC",
        )
        .map_err(DatabaseError::from)?;

    let rows = stmt
        .query_map(params![document_id.to_string()], audit_row)
        .map_err(DatabaseError::from)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(audit_from_row(row.map_err(DatabaseError::from)?)?);
    }
    Ok(records)
}

struct JobRow {
    id: String,
    document_id: String,
    status: String,
    attempt_count: i64,
    next_attempt_at: String,
    claimed_at: Option<String>,
    last_error: Option<String>,
    created_at: String,
}

fn job_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        status: row.get(2)?,
        attempt_count: row.get(3)?,
        next_attempt_at: row.get(4)?,
        claimed_at: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn job_from_row(row: JobRow) -> Result<ValidationJob, QueueError> {
    Ok(ValidationJob {
        id: parse_id(&row.id)?,
        document_id: parse_id(&row.document_id)?,
        status: row.status.parse()?,
        attempt_count: row.attempt_count,
        next_attempt_at: parse_ts(&row.next_attempt_at),
        claimed_at: row.claimed_at.as_deref().map(parse_ts),
        last_error: row.last_error,
        created_at: parse_ts(&row.created_at),
    })
}

struct AuditRow {
    id: String,
    document_id: String,
    job_id: Option<String>,
    triggered_by: String,
    outcome: String,
    duration_ms: i64,
    model_name: Option<String>,
    error: Option<String>,
    started_at: String,
}

fn audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRow> {
    Ok(AuditRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        job_id: row.get(2)?,
        triggered_by: row.get(3)?,
        outcome: row.get(4)?,
        duration_ms: row.get(5)?,
        model_name: row.get(6)?,
        error: row.get(7)?,
        started_at: row.get(8)?,
    })
}

fn audit_from_row(row: AuditRow) -> Result<AuditRecord, QueueError> {
    let job_id = match row.job_id {
        Some(id) => Some(parse_id(&id)?),
        None => None,
    };
    Ok(AuditRecord {
        id: parse_id(&row.id)?,
        document_id: parse_id(&row.document_id)?,
        job_id,
        triggered_by: row.triggered_by.parse()?,
        outcome: row.outcome.parse()?,
        duration_ms: row.duration_ms,
        model_name: row.model_name,
        error: row.error,
        started_at: parse_ts(&row.started_at),
    })
}

fn parse_id(s: &str) -> Result<Uuid, QueueError> {
    s.parse::<Uuid>().map_err(|_| {
        DatabaseError::InvalidEnum {
            field: "uuid".into(),
            value: s.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{AuditOutcome, TriggeredBy};
    use crate::test_support::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_ts(s)
    }

    #[test]
    fn backoff_delays_are_strictly_increasing() {
        let delays: Vec<_> = (1..=6).map(backoff_delay).collect();
        for pair in delays.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(delays[0], Duration::minutes(1));
        assert_eq!(delays[5], Duration::minutes(1440));
        // Past the schedule the last delay repeats
        assert_eq!(backoff_delay(9), Duration::minutes(1440));
    }

    #[test]
    fn enqueue_and_claim_round_trip() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let now = ts("2026-06-01T12:00:00Z");
        let job = enqueue(&conn, &doc.id, now).unwrap();

        let claimed = claim_due_jobs(&conn, now, Duration::minutes(10), 10).unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, job.id);
        assert_eq!(claimed[0].status, JobStatus::Processing);
        assert_eq!(claimed[0].attempt_count, 1);
    }

    #[test]
    fn claimed_job_is_not_claimable_again_within_visibility() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let now = ts("2026-06-01T12:00:00Z");
        enqueue(&conn, &doc.id, now).unwrap();

        let first = claim_due_jobs(&conn, now, Duration::minutes(10), 10).unwrap();
        assert_eq!(first.len(), 1);
        // A second worker a minute later gets nothing
        let second =
            claim_due_jobs(&conn, ts("2026-06-01T12:01:00Z"), Duration::minutes(10), 10).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn stale_claim_becomes_reclaimable() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let now = ts("2026-06-01T12:00:00Z");
        enqueue(&conn, &doc.id, now).unwrap();
        claim_due_jobs(&conn, now, Duration::minutes(10), 10).unwrap();

        // Crash simulation: the claim is never resolved. After the
        // visibility timeout another worker picks it up.
        let later = ts("2026-06-01T12:15:00Z");
        let reclaimed = claim_due_jobs(&conn, later, Duration::minutes(10), 10).unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].attempt_count, 2);
    }

    #[test]
    fn job_not_due_yet_is_not_claimed() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let now = ts("2026-06-01T12:00:00Z");
        let job = enqueue(&conn, &doc.id, now).unwrap();
        claim_due_jobs(&conn, now, Duration::minutes(10), 10).unwrap();
        fail_job(
            &conn,
            &get_job(&conn, &job.id).unwrap().unwrap(),
            "boom",
            6,
            now,
        )
        .unwrap();

        // Backoff pushed next_attempt_at a minute out
        assert!(claim_due_jobs(&conn, ts("2026-06-01T12:00:30Z"), Duration::minutes(10), 10)
            .unwrap()
            .is_empty());
        assert_eq!(
            claim_due_jobs(&conn, ts("2026-06-01T12:01:00Z"), Duration::minutes(10), 10)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn exhausted_attempts_dead_letter_exactly_once() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let mut now = ts("2026-06-01T12:00:00Z");
        enqueue(&conn, &doc.id, now).unwrap();

        let max_attempts = 3;
        let mut last_status = JobStatus::Queued;
        for _ in 0..max_attempts {
            now += Duration::hours(1);
            let claimed = claim_due_jobs(&conn, now, Duration::minutes(10), 10).unwrap();
            assert_eq!(claimed.len(), 1);
            last_status =
                fail_job(&conn, &claimed[0], "classifier timed out", max_attempts, now).unwrap();
        }
        assert_eq!(last_status, JobStatus::DeadLettered);

        let letters = list_dead_letters(&conn).unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].document_id, doc.id);
        assert_eq!(letters[0].attempt_count, 3);
        assert_eq!(letters[0].last_error, "classifier timed out");

        // Nothing left to claim
        assert!(claim_due_jobs(&conn, now + Duration::days(2), Duration::minutes(10), 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn succeeded_job_stays_done() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let now = ts("2026-06-01T12:00:00Z");
        let job = enqueue(&conn, &doc.id, now).unwrap();
        claim_due_jobs(&conn, now, Duration::minutes(10), 10).unwrap();
        mark_succeeded(&conn, &job.id, now).unwrap();

        assert_eq!(
            get_job(&conn, &job.id).unwrap().unwrap().status,
            JobStatus::Succeeded
        );
        assert!(claim_due_jobs(&conn, now + Duration::days(2), Duration::minutes(10), 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn manual_audit_count_respects_window() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        for (started, trigger) in [
            ("2026-06-01T10:00:00Z", TriggeredBy::Manual),
            ("2026-06-01T11:30:00Z", TriggeredBy::Manual),
            ("2026-06-01T11:45:00Z", TriggeredBy::Queue),
        ] {
            insert_audit(
                &conn,
                &AuditRecord {
                    id: Uuid::new_v4(),
                    document_id: doc.id,
                    job_id: None,
                    triggered_by: trigger,
                    outcome: AuditOutcome::Success,
                    duration_ms: 12,
                    model_name: Some("doc-classifier-v2".into()),
                    error: None,
                    started_at: ts(started),
                },
            )
            .unwrap();
        }

        let count =
            count_manual_audits_since(&conn, &doc.id, ts("2026-06-01T11:00:00Z")).unwrap();
        assert_eq!(count, 1);
    }
}
