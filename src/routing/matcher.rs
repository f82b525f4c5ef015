//! Routing rule matcher: deterministic best-rule selection.

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::Connection;
use uuid::Uuid;

use super::folder::{default_folder, resolve_template, FolderContext};
use super::normalize::normalize_subject;
use super::RoutingError;
use crate::db::repository;
use crate::models::{Employee, RoutingRule, StorageTarget};

/// Where an inbound document should be stored.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// The winning rule; None means the default-target fallback was taken.
    pub rule: Option<RoutingRule>,
    pub target: StorageTarget,
    pub folder_path: String,
}

/// Select the routing rule for a message and resolve its folder path.
///
/// Rules are filtered to those whose sender pattern matches the sender and
/// whose subject pattern matches the normalized subject; the list arrives
/// ordered by priority (desc) then created_at (asc), so the first hit is the
/// deterministic winner. No match falls back to the organization's default
/// storage target with a date-bucketed folder.
pub fn route_message(
    conn: &Connection,
    organization_id: &Uuid,
    sender: &str,
    subject: &str,
    employee: Option<&Employee>,
    request_id: Option<Uuid>,
    today: NaiveDate,
) -> Result<RoutingDecision, RoutingError> {
    let normalized = normalize_subject(subject);
    let rules = repository::list_active_rules(conn, organization_id)?;

    let folder_ctx = FolderContext {
        sender,
        date: today,
        employee,
        request_id,
    };

    for rule in rules {
        if pattern_matches(&rule.sender_pattern, sender)?
            && pattern_matches(&rule.subject_pattern, &normalized)?
        {
            let target = repository::get_storage_target(conn, &rule.storage_target_id)?
                .ok_or_else(|| RoutingError::MissingTarget {
                    rule_id: rule.id.to_string(),
                    target_id: rule.storage_target_id.to_string(),
                })?;
            let folder_path = resolve_template(&rule.folder_template, &folder_ctx);

            tracing::debug!(
                rule_id = %rule.id,
                priority = rule.priority,
                folder = %folder_path,
                "Routing rule matched"
            );
            return Ok(RoutingDecision {
                rule: Some(rule),
                target,
                folder_path,
            });
        }
    }

    let target = repository::get_default_storage_target(conn, organization_id)?
        .ok_or_else(|| RoutingError::NoDefaultTarget(organization_id.to_string()))?;
    let folder_path = default_folder(today);

    tracing::debug!(folder = %folder_path, "No routing rule matched, using default target");
    Ok(RoutingDecision {
        rule: None,
        target,
        folder_path,
    })
}

/// Case-insensitive `*`-wildcard match over the full input.
/// An empty pattern matches everything.
pub fn pattern_matches(pattern: &str, input: &str) -> Result<bool, RoutingError> {
    if pattern.is_empty() || pattern == "*" {
        return Ok(true);
    }

    let translated = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let re = Regex::new(&format!("(?i)^{translated}$"))
        .map_err(|e| RoutingError::BadPattern(e.to_string()))?;
    Ok(re.is_match(input))
}
