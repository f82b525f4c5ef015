//! Status lifecycle tracker for document requests.
//!
//! Owns the status column and the append-only transition history. All
//! transitions are "ensure status is at least X given current evidence":
//! the completion predicate is recomputed from persisted document rows on
//! every call, never read from a counter, so concurrent re-evaluation for
//! the same request is safe to repeat.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::enums::RequestStatus;
use crate::models::StatusHistoryEntry;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Request not found: {0}")]
    RequestNotFound(Uuid),

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Move a draft request onto the ladder (queued for sending).
pub fn mark_pending(
    conn: &Connection,
    request_id: &Uuid,
    actor: &str,
) -> Result<RequestStatus, LifecycleError> {
    ensure_at_least(conn, request_id, RequestStatus::Pending, actor)
}

/// Explicit send action. The trigger itself is outside this core; the
/// tracker only records the transition.
pub fn mark_sent(
    conn: &Connection,
    request_id: &Uuid,
    actor: &str,
) -> Result<RequestStatus, LifecycleError> {
    ensure_at_least(conn, request_id, RequestStatus::Sent, actor)
}

/// Re-evaluate a request after a document linked to it or a validation
/// verdict changed. Returns the (possibly unchanged) status.
pub fn reevaluate(
    conn: &Connection,
    request_id: &Uuid,
    actor: &str,
) -> Result<RequestStatus, LifecycleError> {
    let request = repository::get_request(conn, request_id)?
        .ok_or(LifecycleError::RequestNotFound(*request_id))?;

    if request.status.is_terminal() {
        return Ok(request.status);
    }

    // Always recomputed from persisted rows.
    let linked = repository::count_linked_documents(conn, request_id)?;
    if linked == 0 {
        return Ok(request.status);
    }
    let not_verified = repository::count_linked_not_verified(conn, request_id)?;

    let target = if linked >= request.expected_documents && not_verified == 0 {
        RequestStatus::Completed
    } else {
        RequestStatus::Verifying
    };

    ensure_at_least(conn, request_id, target, actor)
}

/// Daily sweep: expire non-terminal requests whose due date plus the
/// organization's grace window has elapsed. Never touches `completed`.
/// Returns the number of requests expired.
pub fn expiry_sweep(
    conn: &Connection,
    today: NaiveDate,
    actor: &str,
) -> Result<usize, LifecycleError> {
    let past_due = repository::list_requests_past_due(conn, today)?;
    let count = past_due.len();

    for request in past_due {
        transition(
            conn,
            &request.id,
            request.status,
            RequestStatus::Expired,
            actor,
            Some(format!("{{\"due_date\":\"{}\"}}", request.due_date)),
        )?;
    }

    if count > 0 {
        tracing::info!(expired = count, %today, "Expiry sweep marked requests expired");
    }
    Ok(count)
}

/// Explicit correction path — the only way status may move backwards.
/// Appends history like any other transition, with the reason recorded.
pub fn correct_status(
    conn: &Connection,
    request_id: &Uuid,
    new_status: RequestStatus,
    actor: &str,
    reason: &str,
) -> Result<(), LifecycleError> {
    let request = repository::get_request(conn, request_id)?
        .ok_or(LifecycleError::RequestNotFound(*request_id))?;

    if request.status == new_status {
        return Err(LifecycleError::InvalidTransition {
            from: request.status.as_str().into(),
            to: new_status.as_str().into(),
        });
    }

    tracing::warn!(
        request_id = %request_id,
        from = request.status.as_str(),
        to = new_status.as_str(),
        reason,
        "Manual status correction"
    );
    transition(
        conn,
        request_id,
        request.status,
        new_status,
        actor,
        Some(format!("{{\"correction\":\"{reason}\"}}")),
    )
}

/// Walk the forward ladder up to `target`, appending one history entry per
/// step. A no-op when the request already sits at or beyond the target.
fn ensure_at_least(
    conn: &Connection,
    request_id: &Uuid,
    target: RequestStatus,
    actor: &str,
) -> Result<RequestStatus, LifecycleError> {
    let request = repository::get_request(conn, request_id)?
        .ok_or(LifecycleError::RequestNotFound(*request_id))?;

    if request.status.is_terminal() || request.status.rank() >= target.rank() {
        return Ok(request.status);
    }

    const LADDER: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Sent,
        RequestStatus::Received,
        RequestStatus::Verifying,
        RequestStatus::Completed,
    ];

    let mut current = request.status;
    for step in LADDER {
        if step.rank() <= current.rank() {
            continue;
        }
        if step.rank() > target.rank() {
            break;
        }
        transition(conn, request_id, current, step, actor, None)?;
        current = step;
    }
    Ok(current)
}

fn transition(
    conn: &Connection,
    request_id: &Uuid,
    from: RequestStatus,
    to: RequestStatus,
    actor: &str,
    metadata: Option<String>,
) -> Result<(), LifecycleError> {
    let at = Utc::now().naive_utc();
    repository::set_request_status(conn, request_id, to, actor, at)?;
    repository::insert_status_history(
        conn,
        &StatusHistoryEntry {
            id: Uuid::new_v4(),
            request_id: *request_id,
            old_status: from,
            new_status: to,
            actor: actor.into(),
            metadata,
            created_at: at,
        },
    )?;

    tracing::debug!(
        request_id = %request_id,
        from = from.as_str(),
        to = to.as_str(),
        actor,
        "Request status transition"
    );
    Ok(())
}
