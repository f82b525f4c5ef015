//! Outward-facing operations: manual validation triggers and read-only
//! projections for dashboards.

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::enums::{AuditOutcome, TriggeredBy};
use crate::models::{AuditRecord, Document, DocumentRequest, StatusHistoryEntry, ValidationResult};
use crate::pipeline::{DocumentValidator, ValidationError};
use crate::queue::{store as queue_store, QueueError};

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Manual re-validation budget for this document is spent. Returned
    /// synchronously, never silently dropped.
    #[error("Rate limit exceeded for document {document_id}: {limit} manual runs per {window_minutes}m")]
    RateLimited {
        document_id: Uuid,
        limit: i64,
        window_minutes: i64,
    },

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("No validation result for document: {0}")]
    ResultNotFound(Uuid),

    #[error("Request not found: {0}")]
    RequestNotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Fixed-window cap on manual triggers per document.
#[derive(Debug, Clone)]
pub struct RateLimit {
    pub max_triggers: i64,
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_triggers: crate::config::DEFAULT_MANUAL_TRIGGER_LIMIT,
            window: Duration::minutes(crate::config::DEFAULT_MANUAL_TRIGGER_WINDOW_MINUTES),
        }
    }
}

/// Read-only projection of a request for dashboards.
#[derive(Debug)]
pub struct RequestOverview {
    pub request: DocumentRequest,
    /// Live count of linked documents, recomputed per query.
    pub document_count: i64,
    pub documents: Vec<Document>,
    pub history: Vec<StatusHistoryEntry>,
}

pub struct ValidationService<'a> {
    validator: &'a DocumentValidator,
    rate_limit: RateLimit,
}

impl<'a> ValidationService<'a> {
    pub fn new(validator: &'a DocumentValidator) -> Self {
        Self {
            validator,
            rate_limit: RateLimit::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Operator-triggered (re-)validation, synchronous. Every attempt —
    /// allowed or failed — is audited; attempts over the per-window budget
    /// are refused before any collaborator call is made.
    pub fn trigger_validation(
        &self,
        conn: &Connection,
        document_id: &Uuid,
        now: NaiveDateTime,
    ) -> Result<ValidationResult, ServiceError> {
        if repository::get_document(conn, document_id)?.is_none() {
            return Err(ServiceError::DocumentNotFound(*document_id));
        }

        let window_start = now - self.rate_limit.window;
        let recent = queue_store::count_manual_audits_since(conn, document_id, window_start)?;
        if recent >= self.rate_limit.max_triggers {
            tracing::warn!(
                document_id = %document_id,
                recent,
                limit = self.rate_limit.max_triggers,
                "Manual validation refused by rate limit"
            );
            return Err(ServiceError::RateLimited {
                document_id: *document_id,
                limit: self.rate_limit.max_triggers,
                window_minutes: self.rate_limit.window.num_minutes(),
            });
        }

        let started = std::time::Instant::now();
        let outcome = self.validator.validate(conn, document_id, now.date());
        let duration_ms = started.elapsed().as_millis() as i64;

        queue_store::insert_audit(
            conn,
            &AuditRecord {
                id: Uuid::new_v4(),
                document_id: *document_id,
                job_id: None,
                triggered_by: TriggeredBy::Manual,
                outcome: if outcome.is_ok() {
                    AuditOutcome::Success
                } else {
                    AuditOutcome::Failure
                },
                duration_ms,
                model_name: Some(self.validator.model_name().to_string()),
                error: outcome.as_ref().err().map(|e| e.to_string()),
                started_at: now,
            },
        )?;

        Ok(outcome?)
    }
}

/// Latest validation result for a document.
pub fn get_validation(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<ValidationResult, ServiceError> {
    if repository::get_document(conn, document_id)?.is_none() {
        return Err(ServiceError::DocumentNotFound(*document_id));
    }
    repository::get_validation_result(conn, document_id)?
        .ok_or(ServiceError::ResultNotFound(*document_id))
}

/// Status, live document count and full transition history of a request.
pub fn get_request_overview(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<RequestOverview, ServiceError> {
    let request = repository::get_request(conn, request_id)?
        .ok_or(ServiceError::RequestNotFound(*request_id))?;
    let document_count = repository::count_linked_documents(conn, request_id)?;
    let documents = repository::list_documents_for_request(conn, request_id)?;
    let history = repository::list_status_history(conn, request_id)?;

    Ok(RequestOverview {
        request,
        document_count,
        documents,
        history,
    })
}
