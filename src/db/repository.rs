use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

// ═══════════════════════════════════════════
// Timestamp / id helpers
// ═══════════════════════════════════════════

pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .unwrap_or_default()
}

pub fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

// ═══════════════════════════════════════════
// Organization Repository
// ═══════════════════════════════════════════

pub fn insert_organization(conn: &Connection, org: &Organization) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO organizations (id, name, owner_threshold, authenticity_threshold,
         compliance_threshold, strict_duplicates, allow_expired, expiry_grace_days, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            org.id.to_string(),
            org.name,
            org.owner_threshold,
            org.authenticity_threshold,
            org.compliance_threshold,
            org.strict_duplicates as i32,
            org.allow_expired as i32,
            org.expiry_grace_days,
            fmt_ts(org.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_organization(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Organization>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, owner_threshold, authenticity_threshold, compliance_threshold,
         strict_duplicates, allow_expired, expiry_grace_days, created_at
         FROM organizations WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(OrganizationRow {
                id: row.get(0)?,
                name: row.get(1)?,
                owner_threshold: row.get(2)?,
                authenticity_threshold: row.get(3)?,
                compliance_threshold: row.get(4)?,
                strict_duplicates: row.get(5)?,
                allow_expired: row.get(6)?,
                expiry_grace_days: row.get(7)?,
                created_at: row.get(8)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(organization_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct OrganizationRow {
    id: String,
    name: String,
    owner_threshold: f32,
    authenticity_threshold: f32,
    compliance_threshold: f32,
    strict_duplicates: i32,
    allow_expired: i32,
    expiry_grace_days: i64,
    created_at: String,
}

fn organization_from_row(row: OrganizationRow) -> Result<Organization, DatabaseError> {
    Ok(Organization {
        id: parse_uuid(&row.id)?,
        name: row.name,
        owner_threshold: row.owner_threshold,
        authenticity_threshold: row.authenticity_threshold,
        compliance_threshold: row.compliance_threshold,
        strict_duplicates: row.strict_duplicates != 0,
        allow_expired: row.allow_expired != 0,
        expiry_grace_days: row.expiry_grace_days,
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Employee Repository
// ═══════════════════════════════════════════

pub fn insert_employee(conn: &Connection, emp: &Employee) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO employees (id, organization_id, full_name, email, date_of_birth, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            emp.id.to_string(),
            emp.organization_id.to_string(),
            emp.full_name,
            emp.email,
            emp.date_of_birth.map(fmt_date),
            fmt_ts(emp.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_employees(
    conn: &Connection,
    organization_id: &Uuid,
) -> Result<Vec<Employee>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, organization_id, full_name, email, date_of_birth, created_at
         FROM employees WHERE organization_id = ?1 ORDER BY full_name ASC",
    )?;

    let rows = stmt.query_map(params![organization_id.to_string()], employee_row)?;

    let mut employees = Vec::new();
    for row in rows {
        employees.push(employee_from_row(row?)?);
    }
    Ok(employees)
}

pub fn find_employee_by_email(
    conn: &Connection,
    organization_id: &Uuid,
    email: &str,
) -> Result<Option<Employee>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, organization_id, full_name, email, date_of_birth, created_at
         FROM employees WHERE organization_id = ?1 AND LOWER(email) = LOWER(?2) LIMIT 1",
        params![organization_id.to_string(), email],
        employee_row,
    );

    match result {
        Ok(row) => Ok(Some(employee_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct EmployeeRow {
    id: String,
    organization_id: String,
    full_name: String,
    email: String,
    date_of_birth: Option<String>,
    created_at: String,
}

fn employee_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmployeeRow> {
    Ok(EmployeeRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        date_of_birth: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn employee_from_row(row: EmployeeRow) -> Result<Employee, DatabaseError> {
    Ok(Employee {
        id: parse_uuid(&row.id)?,
        organization_id: parse_uuid(&row.organization_id)?,
        full_name: row.full_name,
        email: row.email,
        date_of_birth: row.date_of_birth.as_deref().and_then(parse_date),
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Mail Account Repository
// ═══════════════════════════════════════════

pub fn insert_account(conn: &Connection, account: &MailAccount) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO mail_accounts (id, organization_id, address, last_cursor, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account.id.to_string(),
            account.organization_id.to_string(),
            account.address,
            account.last_cursor,
            account.active as i32,
            fmt_ts(account.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &Uuid) -> Result<Option<MailAccount>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, organization_id, address, last_cursor, active, created_at
         FROM mail_accounts WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(AccountRow {
                id: row.get(0)?,
                organization_id: row.get(1)?,
                address: row.get(2)?,
                last_cursor: row.get(3)?,
                active: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(MailAccount {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            address: row.address,
            last_cursor: row.last_cursor,
            active: row.active != 0,
            created_at: parse_ts(&row.created_at),
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct AccountRow {
    id: String,
    organization_id: String,
    address: String,
    last_cursor: Option<String>,
    active: i32,
    created_at: String,
}

/// Conditional cursor advance. Succeeds only when the stored cursor still
/// matches `expected`, so concurrent workers never skip or reprocess.
pub fn advance_cursor(
    conn: &Connection,
    account_id: &Uuid,
    expected: Option<&str>,
    new_cursor: &str,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE mail_accounts SET last_cursor = ?1 WHERE id = ?2 AND last_cursor IS ?3",
        params![new_cursor, account_id.to_string(), expected],
    )?;
    Ok(updated == 1)
}

// ═══════════════════════════════════════════
// Storage Target Repository
// ═══════════════════════════════════════════

pub fn insert_storage_target(
    conn: &Connection,
    target: &StorageTarget,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO storage_targets (id, organization_id, provider, root_path, is_default, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            target.id.to_string(),
            target.organization_id.to_string(),
            target.provider.as_str(),
            target.root_path,
            target.is_default as i32,
            fmt_ts(target.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_storage_target(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<StorageTarget>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, organization_id, provider, root_path, is_default, created_at
         FROM storage_targets WHERE id = ?1",
        params![id.to_string()],
        storage_target_row,
    );

    match result {
        Ok(row) => Ok(Some(storage_target_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_default_storage_target(
    conn: &Connection,
    organization_id: &Uuid,
) -> Result<Option<StorageTarget>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, organization_id, provider, root_path, is_default, created_at
         FROM storage_targets WHERE organization_id = ?1 AND is_default = 1 LIMIT 1",
        params![organization_id.to_string()],
        storage_target_row,
    );

    match result {
        Ok(row) => Ok(Some(storage_target_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct StorageTargetRow {
    id: String,
    organization_id: String,
    provider: String,
    root_path: String,
    is_default: i32,
    created_at: String,
}

fn storage_target_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StorageTargetRow> {
    Ok(StorageTargetRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        provider: row.get(2)?,
        root_path: row.get(3)?,
        is_default: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn storage_target_from_row(row: StorageTargetRow) -> Result<StorageTarget, DatabaseError> {
    Ok(StorageTarget {
        id: parse_uuid(&row.id)?,
        organization_id: parse_uuid(&row.organization_id)?,
        provider: StorageProvider::from_str(&row.provider)?,
        root_path: row.root_path,
        is_default: row.is_default != 0,
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Routing Rule Repository
// ═══════════════════════════════════════════

pub fn insert_routing_rule(conn: &Connection, rule: &RoutingRule) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO routing_rules (id, organization_id, sender_pattern, subject_pattern,
         priority, storage_target_id, folder_template, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            rule.id.to_string(),
            rule.organization_id.to_string(),
            rule.sender_pattern,
            rule.subject_pattern,
            rule.priority,
            rule.storage_target_id.to_string(),
            rule.folder_template,
            rule.active as i32,
            fmt_ts(rule.created_at),
        ],
    )?;
    Ok(())
}

/// Active rules for an organization, highest priority first; created_at
/// breaks ties so the matcher can take the first hit deterministically.
pub fn list_active_rules(
    conn: &Connection,
    organization_id: &Uuid,
) -> Result<Vec<RoutingRule>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, organization_id, sender_pattern, subject_pattern, priority,
         storage_target_id, folder_template, active, created_at
         FROM routing_rules
         WHERE organization_id = ?1 AND active = 1
         ORDER BY priority DESC, created_at ASC",
    )?;

    let rows = stmt.query_map(params![organization_id.to_string()], |row| {
        Ok(RuleRow {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            sender_pattern: row.get(2)?,
            subject_pattern: row.get(3)?,
            priority: row.get(4)?,
            storage_target_id: row.get(5)?,
            folder_template: row.get(6)?,
            active: row.get(7)?,
            created_at: row.get(8)?,
        })
    })?;

    let mut rules = Vec::new();
    for row in rows {
        rules.push(rule_from_row(row?)?);
    }
    Ok(rules)
}

struct RuleRow {
    id: String,
    organization_id: String,
    sender_pattern: String,
    subject_pattern: String,
    priority: i64,
    storage_target_id: String,
    folder_template: String,
    active: i32,
    created_at: String,
}

fn rule_from_row(row: RuleRow) -> Result<RoutingRule, DatabaseError> {
    Ok(RoutingRule {
        id: parse_uuid(&row.id)?,
        organization_id: parse_uuid(&row.organization_id)?,
        sender_pattern: row.sender_pattern,
        subject_pattern: row.subject_pattern,
        priority: row.priority,
        storage_target_id: parse_uuid(&row.storage_target_id)?,
        folder_template: row.folder_template,
        active: row.active != 0,
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Document Request Repository
// ═══════════════════════════════════════════

pub fn insert_request(conn: &Connection, req: &DocumentRequest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO document_requests (id, organization_id, recipient_email, subject,
         requested_type, due_date, expected_documents, status, status_changed_at,
         status_changed_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            req.id.to_string(),
            req.organization_id.to_string(),
            req.recipient_email,
            req.subject,
            req.requested_type,
            fmt_date(req.due_date),
            req.expected_documents,
            req.status.as_str(),
            fmt_ts(req.status_changed_at),
            req.status_changed_by,
            fmt_ts(req.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_request(conn: &Connection, id: &Uuid) -> Result<Option<DocumentRequest>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, organization_id, recipient_email, subject, requested_type, due_date,
         expected_documents, status, status_changed_at, status_changed_by, created_at
         FROM document_requests WHERE id = ?1",
        params![id.to_string()],
        request_row,
    );

    match result {
        Ok(row) => Ok(Some(request_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Correlation candidate set: requests for this organization addressed to
/// the sender (case-insensitive) that are not yet completed or expired.
pub fn list_open_requests_for_sender(
    conn: &Connection,
    organization_id: &Uuid,
    sender: &str,
) -> Result<Vec<DocumentRequest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, organization_id, recipient_email, subject, requested_type, due_date,
         expected_documents, status, status_changed_at, status_changed_by, created_at
         FROM document_requests
         WHERE organization_id = ?1
           AND LOWER(recipient_email) = LOWER(?2)
           AND status NOT IN ('completed', 'expired')
         ORDER BY created_at ASC",
    )?;

    let rows = stmt.query_map(params![organization_id.to_string(), sender], request_row)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_row(row?)?);
    }
    Ok(requests)
}

/// Non-terminal requests whose due date plus the organization's grace window
/// has elapsed — the expiry sweep's input.
pub fn list_requests_past_due(
    conn: &Connection,
    today: NaiveDate,
) -> Result<Vec<DocumentRequest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.organization_id, r.recipient_email, r.subject, r.requested_type,
         r.due_date, r.expected_documents, r.status, r.status_changed_at,
         r.status_changed_by, r.created_at
         FROM document_requests r
         JOIN organizations o ON o.id = r.organization_id
         WHERE r.status NOT IN ('completed', 'expired')
           AND date(r.due_date, '+' || o.expiry_grace_days || ' days') < date(?1)",
    )?;

    let rows = stmt.query_map(params![fmt_date(today)], request_row)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_row(row?)?);
    }
    Ok(requests)
}

/// Raw status write. Callers go through the lifecycle tracker, which
/// appends the matching history entry.
pub fn set_request_status(
    conn: &Connection,
    request_id: &Uuid,
    status: RequestStatus,
    actor: &str,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE document_requests
         SET status = ?1, status_changed_at = ?2, status_changed_by = ?3
         WHERE id = ?4",
        params![status.as_str(), fmt_ts(at), actor, request_id.to_string()],
    )?;
    Ok(())
}

/// Live count of linked documents — the derived `document count`.
pub fn count_linked_documents(conn: &Connection, request_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE request_id = ?1",
        params![request_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_linked_not_verified(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE request_id = ?1 AND validation_status != 'verified'",
        params![request_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

struct RequestRow {
    id: String,
    organization_id: String,
    recipient_email: String,
    subject: String,
    requested_type: Option<String>,
    due_date: String,
    expected_documents: i64,
    status: String,
    status_changed_at: String,
    status_changed_by: String,
    created_at: String,
}

fn request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        recipient_email: row.get(2)?,
        subject: row.get(3)?,
        requested_type: row.get(4)?,
        due_date: row.get(5)?,
        expected_documents: row.get(6)?,
        status: row.get(7)?,
        status_changed_at: row.get(8)?,
        status_changed_by: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn request_from_row(row: RequestRow) -> Result<DocumentRequest, DatabaseError> {
    Ok(DocumentRequest {
        id: parse_uuid(&row.id)?,
        organization_id: parse_uuid(&row.organization_id)?,
        recipient_email: row.recipient_email,
        subject: row.subject,
        requested_type: row.requested_type,
        due_date: parse_date(&row.due_date).unwrap_or_default(),
        expected_documents: row.expected_documents,
        status: RequestStatus::from_str(&row.status)?,
        status_changed_at: parse_ts(&row.status_changed_at),
        status_changed_by: row.status_changed_by,
        created_at: parse_ts(&row.created_at),
    })
}

// ═══════════════════════════════════════════
// Status History Repository
// ═══════════════════════════════════════════

pub fn insert_status_history(
    conn: &Connection,
    entry: &StatusHistoryEntry,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO request_status_history (id, request_id, old_status, new_status,
         actor, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id.to_string(),
            entry.request_id.to_string(),
            entry.old_status.as_str(),
            entry.new_status.as_str(),
            entry.actor,
            entry.metadata,
            fmt_ts(entry.created_at),
        ],
    )?;
    Ok(())
}

pub fn list_status_history(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Vec<StatusHistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, request_id, old_status, new_status, actor, metadata, created_at
         FROM request_status_history WHERE request_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![request_id.to_string()], |row| {
        Ok(HistoryRow {
            id: row.get(0)?,
            request_id: row.get(1)?,
            old_status: row.get(2)?,
            new_status: row.get(3)?,
            actor: row.get(4)?,
            metadata: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let row = row?;
        entries.push(StatusHistoryEntry {
            id: parse_uuid(&row.id)?,
            request_id: parse_uuid(&row.request_id)?,
            old_status: RequestStatus::from_str(&row.old_status)?,
            new_status: RequestStatus::from_str(&row.new_status)?,
            actor: row.actor,
            metadata: row.metadata,
            created_at: parse_ts(&row.created_at),
        });
    }
    Ok(entries)
}

struct HistoryRow {
    id: String,
    request_id: String,
    old_status: String,
    new_status: String,
    actor: String,
    metadata: Option<String>,
    created_at: String,
}

// ═══════════════════════════════════════════
// Document Repository
// ═══════════════════════════════════════════

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, organization_id, request_id, filename, storage_provider,
         storage_path, routing_rule_id, content_hash, sender_email, validation_status, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            doc.id.to_string(),
            doc.organization_id.to_string(),
            doc.request_id.map(|id| id.to_string()),
            doc.filename,
            doc.storage_provider.as_str(),
            doc.storage_path,
            doc.routing_rule_id.map(|id| id.to_string()),
            doc.content_hash,
            doc.sender_email,
            doc.validation_status.as_str(),
            fmt_ts(doc.received_at),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, organization_id, request_id, filename, storage_provider, storage_path,
         routing_rule_id, content_hash, sender_email, validation_status, received_at
         FROM documents WHERE id = ?1",
        params![id.to_string()],
        document_row,
    );

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn link_document_to_request(
    conn: &Connection,
    document_id: &Uuid,
    request_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET request_id = ?1 WHERE id = ?2",
        params![request_id.to_string(), document_id.to_string()],
    )?;
    Ok(())
}

pub fn set_document_validation_status(
    conn: &Connection,
    document_id: &Uuid,
    status: ValidationStatus,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET validation_status = ?1 WHERE id = ?2",
        params![status.as_str(), document_id.to_string()],
    )?;
    Ok(())
}

pub fn list_documents_for_request(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, organization_id, request_id, filename, storage_provider, storage_path,
         routing_rule_id, content_hash, sender_email, validation_status, received_at
         FROM documents WHERE request_id = ?1 ORDER BY received_at ASC",
    )?;

    let rows = stmt.query_map(params![request_id.to_string()], document_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

/// Other documents in the organization sharing a content hash — the
/// duplicate check. Filename and storage path are deliberately ignored.
pub fn list_documents_with_hash(
    conn: &Connection,
    organization_id: &Uuid,
    content_hash: &str,
    exclude_document: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM documents
         WHERE organization_id = ?1 AND content_hash = ?2 AND id != ?3",
    )?;

    let rows = stmt.query_map(
        params![
            organization_id.to_string(),
            content_hash,
            exclude_document.to_string()
        ],
        |row| row.get::<_, String>(0),
    )?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

struct DocumentRow {
    id: String,
    organization_id: String,
    request_id: Option<String>,
    filename: String,
    storage_provider: String,
    storage_path: String,
    routing_rule_id: Option<String>,
    content_hash: String,
    sender_email: String,
    validation_status: String,
    received_at: String,
}

fn document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        request_id: row.get(2)?,
        filename: row.get(3)?,
        storage_provider: row.get(4)?,
        storage_path: row.get(5)?,
        routing_rule_id: row.get(6)?,
        content_hash: row.get(7)?,
        sender_email: row.get(8)?,
        validation_status: row.get(9)?,
        received_at: row.get(10)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: parse_uuid(&row.id)?,
        organization_id: parse_uuid(&row.organization_id)?,
        request_id: row.request_id.as_deref().map(parse_uuid).transpose()?,
        filename: row.filename,
        storage_provider: StorageProvider::from_str(&row.storage_provider)?,
        storage_path: row.storage_path,
        routing_rule_id: row.routing_rule_id.as_deref().map(parse_uuid).transpose()?,
        content_hash: row.content_hash,
        sender_email: row.sender_email,
        validation_status: ValidationStatus::from_str(&row.validation_status)?,
        received_at: parse_ts(&row.received_at),
    })
}

// ═══════════════════════════════════════════
// Validation Result Repository
// ═══════════════════════════════════════════

/// Latest result supersedes any prior one for the document (1:1).
pub fn upsert_validation_result(
    conn: &Connection,
    result: &ValidationResult,
) -> Result<(), DatabaseError> {
    let critical = serde_json::to_string(&result.critical_issues)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    let warnings = serde_json::to_string(&result.warnings)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    conn.execute(
        "INSERT OR REPLACE INTO validation_results (id, document_id, document_type,
         type_confidence, owner_confidence, matched_employee_id, expiry_date, expiry_status,
         authenticity_score, is_duplicate, compliance_score, verdict, critical_issues,
         warnings, model_name, validated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            result.id.to_string(),
            result.document_id.to_string(),
            result.document_type,
            result.type_confidence,
            result.owner_confidence,
            result.matched_employee_id.map(|id| id.to_string()),
            result.expiry_date.map(fmt_date),
            result.expiry_status.as_str(),
            result.authenticity_score,
            result.is_duplicate as i32,
            result.compliance_score,
            result.verdict.as_str(),
            critical,
            warnings,
            result.model_name,
            fmt_ts(result.validated_at),
        ],
    )?;
    Ok(())
}

pub fn get_validation_result(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Option<ValidationResult>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, document_id, document_type, type_confidence, owner_confidence,
         matched_employee_id, expiry_date, expiry_status, authenticity_score, is_duplicate,
         compliance_score, verdict, critical_issues, warnings, model_name, validated_at
         FROM validation_results WHERE document_id = ?1",
        params![document_id.to_string()],
        |row| {
            Ok(ValidationResultRow {
                id: row.get(0)?,
                document_id: row.get(1)?,
                document_type: row.get(2)?,
                type_confidence: row.get(3)?,
                owner_confidence: row.get(4)?,
                matched_employee_id: row.get(5)?,
                expiry_date: row.get(6)?,
                expiry_status: row.get(7)?,
                authenticity_score: row.get(8)?,
                is_duplicate: row.get(9)?,
                compliance_score: row.get(10)?,
                verdict: row.get(11)?,
                critical_issues: row.get(12)?,
                warnings: row.get(13)?,
                model_name: row.get(14)?,
                validated_at: row.get(15)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(validation_result_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct ValidationResultRow {
    id: String,
    document_id: String,
    document_type: String,
    type_confidence: f32,
    owner_confidence: f32,
    matched_employee_id: Option<String>,
    expiry_date: Option<String>,
    expiry_status: String,
    authenticity_score: f32,
    is_duplicate: i32,
    compliance_score: f32,
    verdict: String,
    critical_issues: String,
    warnings: String,
    model_name: String,
    validated_at: String,
}

fn validation_result_from_row(row: ValidationResultRow) -> Result<ValidationResult, DatabaseError> {
    let critical_issues: Vec<String> = serde_json::from_str(&row.critical_issues)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    let warnings: Vec<String> = serde_json::from_str(&row.warnings)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    Ok(ValidationResult {
        id: parse_uuid(&row.id)?,
        document_id: parse_uuid(&row.document_id)?,
        document_type: row.document_type,
        type_confidence: row.type_confidence,
        owner_confidence: row.owner_confidence,
        matched_employee_id: row
            .matched_employee_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?,
        expiry_date: row.expiry_date.as_deref().and_then(parse_date),
        expiry_status: ExpiryStatus::from_str(&row.expiry_status)?,
        authenticity_score: row.authenticity_score,
        is_duplicate: row.is_duplicate != 0,
        compliance_score: row.compliance_score,
        verdict: Verdict::from_str(&row.verdict)?,
        critical_issues,
        warnings,
        model_name: row.model_name,
        validated_at: parse_ts(&row.validated_at),
    })
}

// ═══════════════════════════════════════════
// Renewal Reminder Repository
// ═══════════════════════════════════════════

/// Insert a reminder unless an identical (document, date) one exists.
/// Returns true when a row was actually inserted.
pub fn schedule_reminder(
    conn: &Connection,
    reminder: &RenewalReminder,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO renewal_reminders
         (id, document_id, reminder_date, expiry_date, sent, sent_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reminder.id.to_string(),
            reminder.document_id.to_string(),
            fmt_date(reminder.reminder_date),
            fmt_date(reminder.expiry_date),
            reminder.sent as i32,
            reminder.sent_at.map(fmt_ts),
            fmt_ts(reminder.created_at),
        ],
    )?;
    Ok(inserted == 1)
}

/// Reminders due today or earlier that have not been sent.
pub fn list_due_reminders(
    conn: &Connection,
    today: NaiveDate,
) -> Result<Vec<RenewalReminder>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, reminder_date, expiry_date, sent, sent_at, created_at
         FROM renewal_reminders
         WHERE sent = 0 AND reminder_date <= ?1
         ORDER BY reminder_date ASC",
    )?;

    let rows = stmt.query_map(params![fmt_date(today)], reminder_row)?;

    let mut reminders = Vec::new();
    for row in rows {
        reminders.push(reminder_from_row(row?)?);
    }
    Ok(reminders)
}

pub fn list_reminders_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<RenewalReminder>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, reminder_date, expiry_date, sent, sent_at, created_at
         FROM renewal_reminders WHERE document_id = ?1 ORDER BY reminder_date ASC",
    )?;

    let rows = stmt.query_map(params![document_id.to_string()], reminder_row)?;

    let mut reminders = Vec::new();
    for row in rows {
        reminders.push(reminder_from_row(row?)?);
    }
    Ok(reminders)
}

pub fn mark_reminder_sent(
    conn: &Connection,
    reminder_id: &Uuid,
    at: NaiveDateTime,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE renewal_reminders SET sent = 1, sent_at = ?1 WHERE id = ?2",
        params![fmt_ts(at), reminder_id.to_string()],
    )?;
    Ok(())
}

struct ReminderRow {
    id: String,
    document_id: String,
    reminder_date: String,
    expiry_date: String,
    sent: i32,
    sent_at: Option<String>,
    created_at: String,
}

fn reminder_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        reminder_date: row.get(2)?,
        expiry_date: row.get(3)?,
        sent: row.get(4)?,
        sent_at: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn reminder_from_row(row: ReminderRow) -> Result<RenewalReminder, DatabaseError> {
    Ok(RenewalReminder {
        id: parse_uuid(&row.id)?,
        document_id: parse_uuid(&row.document_id)?,
        reminder_date: parse_date(&row.reminder_date).unwrap_or_default(),
        expiry_date: parse_date(&row.expiry_date).unwrap_or_default(),
        sent: row.sent != 0,
        sent_at: row.sent_at.as_deref().map(parse_ts),
        created_at: parse_ts(&row.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::test_support::*;

    #[test]
    fn organization_round_trip() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);

        let loaded = get_organization(&conn, &org.id).unwrap().unwrap();
        assert_eq!(loaded.name, org.name);
        assert_eq!(loaded.owner_threshold, 0.90);
        assert!(!loaded.strict_duplicates);
    }

    #[test]
    fn missing_entities_return_none() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        assert!(get_organization(&conn, &id).unwrap().is_none());
        assert!(get_request(&conn, &id).unwrap().is_none());
        assert!(get_document(&conn, &id).unwrap().is_none());
        assert!(get_validation_result(&conn, &id).unwrap().is_none());
    }

    #[test]
    fn open_requests_filter_by_sender_and_status() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);

        let open = seed_request(&conn, &org, "Anna@Acme.com", "Passport request");
        let mut done = make_request(&org, "anna@acme.com", "Old request");
        done.status = RequestStatus::Completed;
        insert_request(&conn, &done).unwrap();
        seed_request(&conn, &org, "other@acme.com", "Different sender");

        let found = list_open_requests_for_sender(&conn, &org.id, "anna@acme.com").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, open.id);
    }

    #[test]
    fn cursor_advance_is_conditional() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let account = seed_account(&conn, &org);

        // From None
        assert!(advance_cursor(&conn, &account.id, None, "msg-10").unwrap());
        // Stale expectation does not move the cursor
        assert!(!advance_cursor(&conn, &account.id, None, "msg-20").unwrap());
        assert!(!advance_cursor(&conn, &account.id, Some("msg-5"), "msg-20").unwrap());
        // Matching expectation does
        assert!(advance_cursor(&conn, &account.id, Some("msg-10"), "msg-20").unwrap());

        let loaded = get_account(&conn, &account.id).unwrap().unwrap();
        assert_eq!(loaded.last_cursor.as_deref(), Some("msg-20"));
    }

    #[test]
    fn active_rules_ordered_by_priority_then_created() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let target = seed_target(&conn, &org);

        let low = seed_rule(&conn, &org, &target, "*", 1, "2026-01-02T00:00:00Z");
        let high = seed_rule(&conn, &org, &target, "*", 5, "2026-01-03T00:00:00Z");
        let high_earlier = seed_rule(&conn, &org, &target, "*", 5, "2026-01-01T00:00:00Z");

        let rules = list_active_rules(&conn, &org.id).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].id, high_earlier.id);
        assert_eq!(rules[1].id, high.id);
        assert_eq!(rules[2].id, low.id);
    }

    #[test]
    fn inactive_rules_are_excluded() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let target = seed_target(&conn, &org);

        let mut rule = make_rule(&org, &target, "*", 1);
        rule.active = false;
        insert_routing_rule(&conn, &rule).unwrap();

        assert!(list_active_rules(&conn, &org.id).unwrap().is_empty());
    }

    #[test]
    fn linked_document_count_is_live() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let request = seed_request(&conn, &org, "a@b.com", "Docs");

        assert_eq!(count_linked_documents(&conn, &request.id).unwrap(), 0);

        let doc = seed_document(&conn, &org, "h1");
        link_document_to_request(&conn, &doc.id, &request.id).unwrap();
        assert_eq!(count_linked_documents(&conn, &request.id).unwrap(), 1);
        assert_eq!(count_linked_not_verified(&conn, &request.id).unwrap(), 1);

        set_document_validation_status(&conn, &doc.id, ValidationStatus::Verified).unwrap();
        assert_eq!(count_linked_not_verified(&conn, &request.id).unwrap(), 0);
    }

    #[test]
    fn duplicate_hash_lookup_ignores_filename() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);

        let a = seed_document_named(&conn, &org, "same-hash", "report.pdf");
        let b = seed_document_named(&conn, &org, "same-hash", "renamed.pdf");
        seed_document(&conn, &org, "other-hash");

        let dupes_of_a = list_documents_with_hash(&conn, &org.id, "same-hash", &a.id).unwrap();
        assert_eq!(dupes_of_a, vec![b.id]);
        let dupes_of_b = list_documents_with_hash(&conn, &org.id, "same-hash", &b.id).unwrap();
        assert_eq!(dupes_of_b, vec![a.id]);
    }

    #[test]
    fn validation_result_upsert_supersedes() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let mut result = make_validation_result(&doc, Verdict::NeedsReview);
        upsert_validation_result(&conn, &result).unwrap();

        result.id = Uuid::new_v4();
        result.verdict = Verdict::Verified;
        upsert_validation_result(&conn, &result).unwrap();

        let loaded = get_validation_result(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.verdict, Verdict::Verified);

        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM validation_results WHERE document_id = ?1",
                params![doc.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn reminder_schedule_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let reminder = make_reminder(&doc, "2026-06-01", "2026-09-01");
        assert!(schedule_reminder(&conn, &reminder).unwrap());

        let again = make_reminder(&doc, "2026-06-01", "2026-09-01");
        assert!(!schedule_reminder(&conn, &again).unwrap());

        assert_eq!(list_reminders_for_document(&conn, &doc.id).unwrap().len(), 1);
    }

    #[test]
    fn due_reminders_respect_sent_flag_and_date() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn);
        let doc = seed_document(&conn, &org, "h1");

        let past = make_reminder(&doc, "2026-05-01", "2026-09-01");
        let future = make_reminder(&doc, "2027-01-01", "2027-04-01");
        schedule_reminder(&conn, &past).unwrap();
        schedule_reminder(&conn, &future).unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let due = list_due_reminders(&conn, today).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);

        mark_reminder_sent(&conn, &past.id, chrono::Utc::now().naive_utc()).unwrap();
        assert!(list_due_reminders(&conn, today).unwrap().is_empty());
    }

    #[test]
    fn expiry_sweep_query_applies_grace_window() {
        let conn = open_memory_database().unwrap();
        let org = seed_org(&conn); // grace = 3 days

        let mut overdue = make_request(&org, "a@b.com", "Overdue");
        overdue.due_date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        overdue.status = RequestStatus::Sent;
        insert_request(&conn, &overdue).unwrap();

        let mut in_grace = make_request(&org, "a@b.com", "In grace");
        in_grace.due_date = NaiveDate::from_ymd_opt(2026, 5, 29).unwrap();
        in_grace.status = RequestStatus::Sent;
        insert_request(&conn, &in_grace).unwrap();

        let mut completed = make_request(&org, "a@b.com", "Done");
        completed.due_date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        completed.status = RequestStatus::Completed;
        insert_request(&conn, &completed).unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 5, 31).unwrap();
        let past_due = list_requests_past_due(&conn, today).unwrap();
        assert_eq!(past_due.len(), 1);
        assert_eq!(past_due[0].id, overdue.id);
    }
}
