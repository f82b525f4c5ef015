//! Folder path templates: `{sender}`, `{date}`, `{year}`, `{month}`,
//! `{employee}`, `{request_id}`.
//!
//! Employee and request context is available even when the rule matched on
//! sender/subject alone, so a template may reference either regardless of
//! how the rule was selected.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::Employee;

/// Context handed to the template resolver.
pub struct FolderContext<'a> {
    pub sender: &'a str,
    pub date: NaiveDate,
    pub employee: Option<&'a Employee>,
    pub request_id: Option<Uuid>,
}

/// Resolve every placeholder in a folder template. Unknown placeholders are
/// left untouched; substituted values are sanitised so they cannot introduce
/// path separators.
pub fn resolve_template(template: &str, ctx: &FolderContext<'_>) -> String {
    let employee = ctx
        .employee
        .map(|e| e.full_name.as_str())
        .unwrap_or("unassigned");
    let request_id = ctx
        .request_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unlinked".to_string());

    template
        .replace("{sender}", &sanitize(&ctx.sender.to_lowercase()))
        .replace("{date}", &ctx.date.format("%Y-%m-%d").to_string())
        .replace("{year}", &ctx.date.format("%Y").to_string())
        .replace("{month}", &ctx.date.format("%m").to_string())
        .replace("{employee}", &sanitize(employee))
        .replace("{request_id}", &request_id)
}

/// Fallback folder when no rule matches: date-bucketed inbox.
pub fn default_folder(date: NaiveDate) -> String {
    format!("inbox/{}", date.format("%Y/%m"))
}

fn sanitize(component: &str) -> String {
    component.replace(['/', '\\'], "-")
}
