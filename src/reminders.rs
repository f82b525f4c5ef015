//! Renewal reminder sweep.
//!
//! Driven entirely by rows the validation pipeline inserts. A daily pass
//! sends every due unsent reminder and flags it; the sent flag makes the
//! sweep idempotent even when it runs twice in one day or is retried
//! after a partial failure.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::RenewalReminder;
use crate::pipeline::ProviderError;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// The outbound notification collaborator.
pub trait NotificationSender {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Default)]
pub struct SweepSummary {
    pub due: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Send every reminder due today or earlier. A send failure leaves that
/// reminder unsent for the next sweep and does not abort the pass.
pub fn run_daily_sweep(
    conn: &Connection,
    sender: &dyn NotificationSender,
    today: NaiveDate,
) -> Result<SweepSummary, ReminderError> {
    let due = repository::list_due_reminders(conn, today)?;
    let mut summary = SweepSummary {
        due: due.len(),
        ..SweepSummary::default()
    };

    for reminder in due {
        let Some(document) = repository::get_document(conn, &reminder.document_id)? else {
            tracing::warn!(reminder_id = %reminder.id, "Reminder points at a missing document");
            continue;
        };

        let (subject, body) = compose(&reminder, &document.filename);
        match sender.send(&document.sender_email, &subject, &body) {
            Ok(()) => {
                repository::mark_reminder_sent(conn, &reminder.id, Utc::now().naive_utc())?;
                summary.sent += 1;
            }
            Err(e) => {
                tracing::warn!(
                    reminder_id = %reminder.id,
                    recipient = %document.sender_email,
                    error = %e,
                    "Reminder notification failed, will retry next sweep"
                );
                summary.failed += 1;
            }
        }
    }

    tracing::info!(due = summary.due, sent = summary.sent, failed = summary.failed, "Reminder sweep finished");
    Ok(summary)
}

fn compose(reminder: &RenewalReminder, filename: &str) -> (String, String) {
    let subject = format!("Renewal reminder: {filename}");
    let body = if reminder.reminder_date >= reminder.expiry_date {
        format!("The document \"{filename}\" expires today ({}). Please submit a renewed version.", reminder.expiry_date)
    } else {
        format!(
            "The document \"{filename}\" expires on {}. Please arrange a renewal.",
            reminder.expiry_date
        )
    };
    (subject, body)
}

/// Reminders on file for one document, oldest first.
pub fn reminders_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<RenewalReminder>, ReminderError> {
    Ok(repository::list_reminders_for_document(conn, document_id)?)
}

/// Recording sender for tests: every accepted notification is kept, and
/// recipients listed in `failing` are refused.
pub struct MockSender {
    pub sent: std::sync::Mutex<Vec<(String, String)>>,
    pub failing: Vec<String>,
}

impl MockSender {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            failing: Vec::new(),
        }
    }
}

impl Default for MockSender {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSender for MockSender {
    fn send(&self, recipient: &str, subject: &str, _body: &str) -> Result<(), ProviderError> {
        if self.failing.iter().any(|f| f == recipient) {
            return Err(ProviderError::Transient(format!(
                "Delivery to {recipient} refused"
            )));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), subject.to_string()));
        Ok(())
    }
}
