//! Expiry analysis: classify the extracted expiry date and schedule
//! renewal reminders at fixed offsets before it.

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::enums::ExpiryStatus;
use crate::models::RenewalReminder;

/// Days before expiry at which a reminder fires. The 0 offset is the
/// expiry day itself.
pub const REMINDER_OFFSETS: [i64; 4] = [90, 60, 30, 0];

/// Date formats the classification collaborator is known to emit.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%d %B %Y"];

/// Parse a date string in any of the accepted formats.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Classify an expiry date relative to `today`.
pub fn classify_expiry(
    expiry: Option<NaiveDate>,
    today: NaiveDate,
    horizon_days: i64,
) -> ExpiryStatus {
    match expiry {
        None => ExpiryStatus::Unknown,
        Some(date) if date < today => ExpiryStatus::Expired,
        Some(date) if date <= today + Duration::days(horizon_days) => ExpiryStatus::ExpiringSoon,
        Some(_) => ExpiryStatus::Valid,
    }
}

/// Schedule reminders at the fixed offsets before `expiry`, skipping dates
/// already in the past. The (document, reminder_date) uniqueness constraint
/// makes re-validation a no-op for dates already scheduled. Returns how many
/// reminders were newly created.
pub fn schedule_renewal_reminders(
    conn: &Connection,
    document_id: &Uuid,
    expiry: NaiveDate,
    today: NaiveDate,
) -> Result<usize, DatabaseError> {
    let mut created = 0;
    for offset in REMINDER_OFFSETS {
        let reminder_date = expiry - Duration::days(offset);
        if reminder_date < today {
            continue;
        }
        let reminder = RenewalReminder {
            id: Uuid::new_v4(),
            document_id: *document_id,
            reminder_date,
            expiry_date: expiry,
            sent: false,
            sent_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        };
        if repository::schedule_reminder(conn, &reminder)? {
            created += 1;
        }
    }
    if created > 0 {
        tracing::debug!(document_id = %document_id, %expiry, created, "Scheduled renewal reminders");
    }
    Ok(created)
}
