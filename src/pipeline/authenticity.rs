//! Authenticity and duplicate checking.
//!
//! Content hashing plus cheap structural validity checks. Nothing here is
//! forensic; the point is catching empty uploads, mislabeled files and
//! resubmissions of bytes the organization already holds.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db::{repository, DatabaseError};
use crate::models::Document;

/// Score assigned when the only finding is a non-strict duplicate.
const DUPLICATE_SCORE: f32 = 0.85;

#[derive(Debug, Clone)]
pub struct AuthenticityCheck {
    /// [0, 1]; 0.0 when a structural check failed outright.
    pub score: f32,
    pub is_duplicate: bool,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// SHA-256 of the stored bytes, base64-encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    BASE64.encode(hasher.finalize())
}

/// Run the structural checks and the same-organization duplicate lookup.
pub fn check_authenticity(
    conn: &Connection,
    document: &Document,
    bytes: &[u8],
    strict_duplicates: bool,
) -> Result<AuthenticityCheck, DatabaseError> {
    let mut critical_issues = Vec::new();
    let mut warnings = Vec::new();

    if bytes.is_empty() {
        critical_issues.push("File is empty".to_string());
    } else if let Some(problem) = signature_mismatch(bytes, &document.filename) {
        critical_issues.push(problem);
    }

    let duplicates = repository::list_documents_with_hash(
        conn,
        &document.organization_id,
        &document.content_hash,
        &document.id,
    )?;
    let is_duplicate = !duplicates.is_empty();
    if is_duplicate {
        let message = format!(
            "Identical content already stored as {} other document(s)",
            duplicates.len()
        );
        if strict_duplicates {
            critical_issues.push(message);
        } else {
            warnings.push(message);
        }
        tracing::info!(
            document_id = %document.id,
            duplicates = duplicates.len(),
            strict = strict_duplicates,
            "Duplicate content hash detected"
        );
    }

    let score = if !critical_issues.is_empty() {
        0.0
    } else if is_duplicate {
        DUPLICATE_SCORE
    } else {
        1.0
    };

    Ok(AuthenticityCheck {
        score,
        is_duplicate,
        critical_issues,
        warnings,
    })
}

/// Check the file signature against what the extension promises. Only
/// formats with unambiguous magic bytes are checked; anything else passes.
fn signature_mismatch(bytes: &[u8], filename: &str) -> Option<String> {
    let extension = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    let expected: &[u8] = match extension.as_str() {
        "pdf" => b"%PDF-",
        "png" => &[0x89, 0x50, 0x4E, 0x47],
        "jpg" | "jpeg" => &[0xFF, 0xD8, 0xFF],
        _ => return None,
    };

    if bytes.starts_with(expected) {
        None
    } else {
        Some(format!("File signature does not match .{extension} extension"))
    }
}
