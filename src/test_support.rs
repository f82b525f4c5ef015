//! Shared fixtures for unit tests: seeded organizations, requests,
//! documents and friends against an in-memory database.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{self, parse_ts};
use crate::models::enums::*;
use crate::models::*;

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_org() -> Organization {
    Organization {
        id: Uuid::new_v4(),
        name: "Acme GmbH".into(),
        owner_threshold: 0.90,
        authenticity_threshold: 0.85,
        compliance_threshold: 0.95,
        strict_duplicates: false,
        allow_expired: false,
        expiry_grace_days: 3,
        created_at: now(),
    }
}

pub fn seed_org(conn: &Connection) -> Organization {
    let org = make_org();
    repository::insert_organization(conn, &org).unwrap();
    org
}

pub fn seed_employee(
    conn: &Connection,
    org: &Organization,
    name: &str,
    email: &str,
    dob: Option<&str>,
) -> Employee {
    let emp = Employee {
        id: Uuid::new_v4(),
        organization_id: org.id,
        full_name: name.into(),
        email: email.into(),
        date_of_birth: dob.map(date),
        created_at: now(),
    };
    repository::insert_employee(conn, &emp).unwrap();
    emp
}

pub fn seed_account(conn: &Connection, org: &Organization) -> MailAccount {
    let account = MailAccount {
        id: Uuid::new_v4(),
        organization_id: org.id,
        address: "intake@acme.com".into(),
        last_cursor: None,
        active: true,
        created_at: now(),
    };
    repository::insert_account(conn, &account).unwrap();
    account
}

pub fn seed_target(conn: &Connection, org: &Organization) -> StorageTarget {
    let target = StorageTarget {
        id: Uuid::new_v4(),
        organization_id: org.id,
        provider: StorageProvider::Local,
        root_path: "/tmp/docflow".into(),
        is_default: true,
        created_at: now(),
    };
    repository::insert_storage_target(conn, &target).unwrap();
    target
}

pub fn make_rule(org: &Organization, target: &StorageTarget, sender: &str, priority: i64) -> RoutingRule {
    RoutingRule {
        id: Uuid::new_v4(),
        organization_id: org.id,
        sender_pattern: sender.into(),
        subject_pattern: "*".into(),
        priority,
        storage_target_id: target.id,
        folder_template: "docs/{year}/{month}".into(),
        active: true,
        created_at: now(),
    }
}

pub fn seed_rule(
    conn: &Connection,
    org: &Organization,
    target: &StorageTarget,
    sender: &str,
    priority: i64,
    created_at: &str,
) -> RoutingRule {
    let mut rule = make_rule(org, target, sender, priority);
    rule.created_at = parse_ts(created_at);
    repository::insert_routing_rule(conn, &rule).unwrap();
    rule
}

pub fn make_request(org: &Organization, recipient: &str, subject: &str) -> DocumentRequest {
    DocumentRequest {
        id: Uuid::new_v4(),
        organization_id: org.id,
        recipient_email: recipient.into(),
        subject: subject.into(),
        requested_type: None,
        due_date: date("2026-12-31"),
        expected_documents: 1,
        status: RequestStatus::Sent,
        status_changed_at: now(),
        status_changed_by: "system".into(),
        created_at: now(),
    }
}

pub fn seed_request(
    conn: &Connection,
    org: &Organization,
    recipient: &str,
    subject: &str,
) -> DocumentRequest {
    let request = make_request(org, recipient, subject);
    repository::insert_request(conn, &request).unwrap();
    request
}

pub fn make_document(org: &Organization, hash: &str, filename: &str) -> Document {
    Document {
        id: Uuid::new_v4(),
        organization_id: org.id,
        request_id: None,
        filename: filename.into(),
        storage_provider: StorageProvider::Local,
        storage_path: format!("docs/{filename}"),
        routing_rule_id: None,
        content_hash: hash.into(),
        sender_email: "anna@acme.com".into(),
        validation_status: ValidationStatus::Pending,
        received_at: now(),
    }
}

pub fn seed_document(conn: &Connection, org: &Organization, hash: &str) -> Document {
    seed_document_named(conn, org, hash, "document.pdf")
}

pub fn seed_document_named(
    conn: &Connection,
    org: &Organization,
    hash: &str,
    filename: &str,
) -> Document {
    let doc = make_document(org, hash, filename);
    repository::insert_document(conn, &doc).unwrap();
    doc
}

pub fn make_validation_result(doc: &Document, verdict: Verdict) -> ValidationResult {
    ValidationResult {
        id: Uuid::new_v4(),
        document_id: doc.id,
        document_type: "passport".into(),
        type_confidence: 0.92,
        owner_confidence: 0.95,
        matched_employee_id: None,
        expiry_date: None,
        expiry_status: ExpiryStatus::Unknown,
        authenticity_score: 1.0,
        is_duplicate: false,
        compliance_score: 1.0,
        verdict,
        critical_issues: vec![],
        warnings: vec![],
        model_name: "doc-classifier-v2".into(),
        validated_at: now(),
    }
}

pub fn make_reminder(doc: &Document, reminder_date: &str, expiry_date: &str) -> RenewalReminder {
    RenewalReminder {
        id: Uuid::new_v4(),
        document_id: doc.id,
        reminder_date: date(reminder_date),
        expiry_date: date(expiry_date),
        sent: false,
        sent_at: None,
        created_at: now(),
    }
}
