//! Inbound message intake: route, correlate, store, and hand off to
//! validation.
//!
//! One message is processed independently of any other; the request
//! lifecycle is the only shared-mutation point and is safe under
//! concurrent arrivals. Upload success is never rolled back by a
//! validation failure.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::correlate::correlate_message;
use crate::db::{repository, DatabaseError};
use crate::lifecycle::{self, LifecycleError};
use crate::models::{AuditRecord, Document, MailAccount};
use crate::models::enums::{AuditOutcome, TriggeredBy, ValidationStatus};
use crate::pipeline::authenticity::content_hash;
use crate::pipeline::{DocumentValidator, ProviderError};
use crate::queue::{store as queue_store, QueueError};
use crate::routing::{route_message, RoutingError};
use crate::storage::StorageSet;

const LIFECYCLE_ACTOR: &str = "intake";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Account is inactive: {0}")]
    AccountInactive(Uuid),

    #[error("No storage adapter for provider: {0}")]
    NoStorageAdapter(String),

    #[error("Routing failed: {0}")]
    Routing(#[from] RoutingError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// One attachment of a parsed inbound message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// A parsed message as the email collaborator yields it. `cursor` is the
/// provider-assigned position used to persist intake progress.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub cursor: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub attachments: Vec<Attachment>,
    pub received_at: NaiveDateTime,
}

/// The email collaborator: yields parsed messages after a cursor, oldest
/// first.
pub trait EmailSource {
    fn fetch_after(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ProviderError>;
}

/// How stored documents reach the validation pipeline. Callers must not
/// assume validation has completed by the time intake returns; `Deferred`
/// gives at-least-once delivery via the resilience queue.
pub enum ValidationMode<'a> {
    Inline(&'a DocumentValidator),
    Deferred,
}

/// What one account drain did.
#[derive(Debug, Default)]
pub struct DrainSummary {
    pub fetched: usize,
    pub processed: usize,
    pub documents_stored: usize,
    pub cursor_advanced: bool,
}

pub struct MessageIntake<'a> {
    storage: &'a StorageSet,
    mode: ValidationMode<'a>,
    batch_size: usize,
}

impl<'a> MessageIntake<'a> {
    pub fn new(storage: &'a StorageSet, mode: ValidationMode<'a>) -> Self {
        Self {
            storage,
            mode,
            batch_size: crate::config::DEFAULT_INTAKE_BATCH_SIZE,
        }
    }

    /// Fetch and process one batch for an account, then advance its cursor
    /// with a conditional write. A failed conditional advance means another
    /// worker got there first; the batch stops there rather than guessing.
    pub fn drain_account(
        &self,
        conn: &Connection,
        source: &dyn EmailSource,
        account_id: &Uuid,
    ) -> Result<DrainSummary, IngestError> {
        let account = repository::get_account(conn, account_id)?
            .ok_or(IngestError::AccountNotFound(*account_id))?;
        if !account.active {
            return Err(IngestError::AccountInactive(*account_id));
        }

        let messages = source.fetch_after(account.last_cursor.as_deref(), self.batch_size)?;
        let mut summary = DrainSummary {
            fetched: messages.len(),
            ..DrainSummary::default()
        };

        let mut last_cursor: Option<String> = None;
        for message in &messages {
            match self.process_message(conn, &account, message) {
                Ok(stored) => {
                    summary.processed += 1;
                    summary.documents_stored += stored.len();
                    last_cursor = Some(message.cursor.clone());
                }
                Err(e) => {
                    // Stop the batch so the cursor never skips past an
                    // unprocessed message.
                    tracing::warn!(
                        account_id = %account_id,
                        cursor = %message.cursor,
                        error = %e,
                        "Message processing failed, stopping batch"
                    );
                    break;
                }
            }
        }

        if let Some(cursor) = last_cursor {
            summary.cursor_advanced =
                repository::advance_cursor(conn, account_id, account.last_cursor.as_deref(), &cursor)?;
            if !summary.cursor_advanced {
                tracing::info!(
                    account_id = %account_id,
                    "Cursor moved concurrently, leaving it as is"
                );
            }
        }
        Ok(summary)
    }

    /// Route, correlate and store one message's attachments, then hand each
    /// stored document to validation. Returns the stored document ids.
    pub fn process_message(
        &self,
        conn: &Connection,
        account: &MailAccount,
        message: &InboundMessage,
    ) -> Result<Vec<Uuid>, IngestError> {
        let org_id = account.organization_id;
        let today = message.received_at.date();

        let employee = repository::find_employee_by_email(conn, &org_id, &message.from)?;
        let correlation = correlate_message(conn, &org_id, &message.from, &message.subject)?;
        let request_id = correlation.request.as_ref().map(|r| r.id);

        let decision = route_message(
            conn,
            &org_id,
            &message.from,
            &message.subject,
            employee.as_ref(),
            request_id,
            today,
        )?;
        let adapter = self
            .storage
            .adapter_for(decision.target.provider)
            .ok_or_else(|| {
                IngestError::NoStorageAdapter(decision.target.provider.as_str().into())
            })?;

        let mut stored = Vec::new();
        for attachment in &message.attachments {
            let path =
                adapter.upload_file(&attachment.bytes, &attachment.filename, &decision.folder_path)?;

            let document = Document {
                id: Uuid::new_v4(),
                organization_id: org_id,
                request_id,
                filename: attachment.filename.clone(),
                storage_provider: decision.target.provider,
                storage_path: path,
                routing_rule_id: decision.rule.as_ref().map(|r| r.id),
                content_hash: content_hash(&attachment.bytes),
                sender_email: message.from.clone(),
                validation_status: ValidationStatus::Pending,
                received_at: message.received_at,
            };
            repository::insert_document(conn, &document)?;
            stored.push(document.id);

            tracing::info!(
                document_id = %document.id,
                filename = %document.filename,
                folder = %decision.folder_path,
                request_id = ?request_id,
                "Attachment stored"
            );
        }

        // Arrival alone advances the request, before any verdict exists.
        if let Some(request_id) = request_id {
            if !stored.is_empty() {
                lifecycle::reevaluate(conn, &request_id, LIFECYCLE_ACTOR)?;
            }
        }

        for document_id in &stored {
            self.dispatch_validation(conn, document_id, message.received_at);
        }
        Ok(stored)
    }

    /// Inline validation failures fall back to the queue so the document is
    /// still validated at least once.
    fn dispatch_validation(&self, conn: &Connection, document_id: &Uuid, now: NaiveDateTime) {
        match &self.mode {
            ValidationMode::Deferred => {
                if let Err(e) = queue_store::enqueue(conn, document_id, now) {
                    tracing::error!(document_id = %document_id, error = %e, "Failed to enqueue validation");
                }
            }
            ValidationMode::Inline(validator) => {
                let started = std::time::Instant::now();
                let outcome = validator.validate(conn, document_id, now.date());
                let duration_ms = started.elapsed().as_millis() as i64;

                let audit = AuditRecord {
                    id: Uuid::new_v4(),
                    document_id: *document_id,
                    job_id: None,
                    triggered_by: TriggeredBy::Inline,
                    outcome: if outcome.is_ok() {
                        AuditOutcome::Success
                    } else {
                        AuditOutcome::Failure
                    },
                    duration_ms,
                    model_name: Some(validator.model_name().to_string()),
                    error: outcome.as_ref().err().map(|e| e.to_string()),
                    started_at: now,
                };
                if let Err(e) = queue_store::insert_audit(conn, &audit) {
                    tracing::error!(document_id = %document_id, error = %e, "Failed to write validation audit");
                }

                if let Err(e) = outcome {
                    tracing::warn!(
                        document_id = %document_id,
                        error = %e,
                        "Inline validation failed, deferring to queue"
                    );
                    if let Err(e) = queue_store::enqueue(conn, document_id, now) {
                        tracing::error!(document_id = %document_id, error = %e, "Failed to enqueue validation");
                    }
                }
            }
        }
    }
}

/// Scripted email source for tests.
pub struct MockEmailSource {
    pub messages: Vec<InboundMessage>,
}

impl EmailSource for MockEmailSource {
    fn fetch_after(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Vec<InboundMessage>, ProviderError> {
        let messages = self
            .messages
            .iter()
            .filter(|m| cursor.map_or(true, |c| m.cursor.as_str() > c))
            .take(limit)
            .cloned()
            .collect();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{RequestStatus, StorageProvider, Verdict};
    use crate::pipeline::classifier::MockClassifier;
    use crate::pipeline::extract::PlainTextExtractor;
    use crate::pipeline::types::Classification;
    use crate::storage::{MemoryStorageAdapter, StorageSet};
    use crate::test_support::*;

    fn message(cursor: &str, from: &str, subject: &str, attachments: Vec<Attachment>) -> InboundMessage {
        InboundMessage {
            cursor: cursor.into(),
            from: from.into(),
            to: vec!["intake@acme.com".into()],
            subject: subject.into(),
            attachments,
            received_at: parse_ts("2026-06-01T12:00:00Z"),
        }
    }

    fn pdf_attachment(filename: &str) -> Attachment {
        Attachment {
            filename: filename.into(),
            bytes: format!("%PDF-1.7 {filename}").into_bytes(),
            mime_type: "application/pdf".into(),
        }
    }

    fn local_storage() -> StorageSet {
        StorageSet::new().register(std::sync::Arc::new(MemoryStorageAdapter::new(
            StorageProvider::Local,
        )))
    }

    #[test]
    fn end_to_end_arrival_auto_approves_and_completes() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        seed_employee(&conn, &org, "Anna Schmidt", "anna@acme.com", None);
        let account = seed_account(&conn, &org);
        let target = seed_target(&conn, &org);
        seed_rule(&conn, &org, &target, "*@acme.com", 5, "2026-01-01T00:00:00Z");

        let mut request = make_request(&org, "anna@acme.com", "Passport Request");
        request.requested_type = Some("passport".into());
        request.due_date = date("2026-06-11");
        insert_request(&conn, &request).unwrap();

        let storage = local_storage();
        let classifier = MockClassifier::new().push(Ok(Classification {
            document_type: "passport".into(),
            confidence: 0.9,
            ..Classification::unknown()
        }));
        let validator = DocumentValidator::new(
            storage.clone(),
            Box::new(PlainTextExtractor),
            Box::new(classifier),
        );
        let intake = MessageIntake::new(&storage, ValidationMode::Inline(&validator));

        let stored = intake
            .process_message(
                &conn,
                &get_account(&conn, &account.id).unwrap().unwrap(),
                &message(
                    "m-1",
                    "anna@acme.com",
                    "Re: Passport Request",
                    vec![pdf_attachment("passport.pdf")],
                ),
            )
            .unwrap();
        assert_eq!(stored.len(), 1);

        let doc = get_document(&conn, &stored[0]).unwrap().unwrap();
        assert_eq!(doc.request_id, Some(request.id));
        assert!(doc.routing_rule_id.is_some());
        assert!(doc.storage_path.starts_with("docs/2026/06/"));

        let result = get_validation_result(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(result.verdict, Verdict::Verified);

        let request = get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert_eq!(count_linked_documents(&conn, &request.id).unwrap(), 1);

        let audits = crate::queue::store::list_audit_for_document(&conn, &doc.id).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].triggered_by, TriggeredBy::Inline);
        assert_eq!(audits[0].outcome, AuditOutcome::Success);
    }

    #[test]
    fn deferred_mode_enqueues_instead_of_validating() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let account = seed_account(&conn, &org);
        seed_target(&conn, &org);

        let storage = local_storage();
        let intake = MessageIntake::new(&storage, ValidationMode::Deferred);

        let stored = intake
            .process_message(
                &conn,
                &account,
                &message("m-1", "anna@acme.com", "Payslip", vec![pdf_attachment("payslip.pdf")]),
            )
            .unwrap();
        assert_eq!(stored.len(), 1);

        // Job queued, nothing validated yet
        let claimed = crate::queue::store::claim_due_jobs(
            &conn,
            parse_ts("2026-06-01T12:00:00Z"),
            chrono::Duration::minutes(10),
            10,
        )
        .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].document_id, stored[0]);
        assert!(get_validation_result(&conn, &stored[0]).unwrap().is_none());
    }

    #[test]
    fn message_without_attachments_stores_nothing() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let account = seed_account(&conn, &org);
        seed_target(&conn, &org);
        let request = seed_request(&conn, &org, "anna@acme.com", "Passport Request");

        let storage = local_storage();
        let intake = MessageIntake::new(&storage, ValidationMode::Deferred);

        let stored = intake
            .process_message(
                &conn,
                &account,
                &message("m-1", "anna@acme.com", "Re: Passport Request", vec![]),
            )
            .unwrap();
        assert!(stored.is_empty());
        // No arrival, no status movement
        assert_eq!(
            get_request(&conn, &request.id).unwrap().unwrap().status,
            RequestStatus::Sent
        );
    }

    #[test]
    fn drain_advances_cursor_after_successful_batch() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let account = seed_account(&conn, &org);
        seed_target(&conn, &org);

        let source = MockEmailSource {
            messages: vec![
                message("m-1", "a@x.com", "One", vec![pdf_attachment("one.pdf")]),
                message("m-2", "b@y.com", "Two", vec![pdf_attachment("two.pdf")]),
            ],
        };
        let storage = local_storage();
        let intake = MessageIntake::new(&storage, ValidationMode::Deferred);

        let summary = intake.drain_account(&conn, &source, &account.id).unwrap();
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.documents_stored, 2);
        assert!(summary.cursor_advanced);

        let account = get_account(&conn, &account.id).unwrap().unwrap();
        assert_eq!(account.last_cursor.as_deref(), Some("m-2"));

        // Second drain sees nothing new
        let summary = intake.drain_account(&conn, &source, &account.id).unwrap();
        assert_eq!(summary.fetched, 0);
        assert!(!summary.cursor_advanced);
    }

    #[test]
    fn concurrent_cursor_move_is_detected() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let account = seed_account(&conn, &org);
        seed_target(&conn, &org);

        let source = MockEmailSource {
            messages: vec![message("m-1", "a@x.com", "One", vec![pdf_attachment("one.pdf")])],
        };
        let storage = local_storage();
        let intake = MessageIntake::new(&storage, ValidationMode::Deferred);

        // Another worker advances the cursor mid-batch
        advance_cursor(&conn, &account.id, None, "m-9").unwrap();

        let summary = intake.drain_account(&conn, &source, &account.id).unwrap();
        assert!(!summary.cursor_advanced);
        let loaded = get_account(&conn, &account.id).unwrap().unwrap();
        assert_eq!(loaded.last_cursor.as_deref(), Some("m-9"));
    }

    #[test]
    fn inactive_account_is_refused() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let mut account = seed_account(&conn, &org);
        account.active = false;
        // Re-insert as inactive under a new id
        account.id = Uuid::new_v4();
        insert_account(&conn, &account).unwrap();

        let storage = local_storage();
        let intake = MessageIntake::new(&storage, ValidationMode::Deferred);
        let source = MockEmailSource { messages: vec![] };

        let err = intake.drain_account(&conn, &source, &account.id).unwrap_err();
        assert!(matches!(err, IngestError::AccountInactive(_)));
    }
}
