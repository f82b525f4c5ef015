//! Request correlator: link an inbound message to the outstanding request
//! it most plausibly answers.
//!
//! The multi-candidate resolution is a heuristic (normalized-subject
//! substring overlap) and is logged for audit rather than treated as a hard
//! guarantee.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::DocumentRequest;
use crate::routing::normalize_subject;

/// Result of correlating one message against an organization's open requests.
#[derive(Debug)]
pub struct CorrelationOutcome {
    pub request: Option<DocumentRequest>,
    pub candidates: usize,
    /// True when more than one open request matched the sender and the
    /// subject-overlap heuristic had to pick.
    pub ambiguous: bool,
}

/// Find the open request this message most plausibly answers.
///
/// Zero candidates → unlinked. One → the match. Several → the candidate
/// whose normalized subject has the greatest substring overlap with the
/// incoming normalized subject (either contains the other); ties fall to
/// the earliest-created request.
pub fn correlate_message(
    conn: &Connection,
    organization_id: &Uuid,
    sender: &str,
    subject: &str,
) -> Result<CorrelationOutcome, DatabaseError> {
    let candidates = repository::list_open_requests_for_sender(conn, organization_id, sender)?;

    match candidates.len() {
        0 => Ok(CorrelationOutcome {
            request: None,
            candidates: 0,
            ambiguous: false,
        }),
        1 => {
            let request = candidates.into_iter().next();
            Ok(CorrelationOutcome {
                request,
                candidates: 1,
                ambiguous: false,
            })
        }
        n => {
            let incoming = normalize_subject(subject);

            // candidates arrive ordered by created_at ASC, so a strict
            // greater-than scan keeps the earliest request on ties.
            let mut best_idx = 0;
            let mut best_score = subject_overlap(&incoming, &candidates[0].subject);
            for (idx, candidate) in candidates.iter().enumerate().skip(1) {
                let score = subject_overlap(&incoming, &candidate.subject);
                if score > best_score {
                    best_score = score;
                    best_idx = idx;
                }
            }

            let chosen = candidates.into_iter().nth(best_idx);
            if let Some(request) = &chosen {
                tracing::info!(
                    sender = %sender,
                    candidates = n,
                    chosen_request = %request.id,
                    overlap = best_score,
                    "Ambiguous correlation resolved by subject overlap"
                );
            }
            Ok(CorrelationOutcome {
                request: chosen,
                candidates: n,
                ambiguous: true,
            })
        }
    }
}

/// Overlap score between the incoming normalized subject and a candidate's
/// subject: the length of the shorter string when either contains the
/// other, 0 otherwise.
fn subject_overlap(incoming: &str, candidate_subject: &str) -> usize {
    let candidate = normalize_subject(candidate_subject);
    if incoming.is_empty() || candidate.is_empty() {
        return 0;
    }
    if incoming.contains(&candidate) || candidate.contains(incoming) {
        incoming.len().min(candidate.len())
    } else {
        0
    }
}
