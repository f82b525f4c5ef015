//! Owner matching: who does this document belong to?
//!
//! An exact sender-email hit in the employee directory is the strongest
//! signal (confidence 1.0). Otherwise names extracted from the document are
//! fuzzily matched against the directory, blended with date-of-birth
//! agreement when both sides have one.

use chrono::NaiveDate;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{repository, DatabaseError};
use crate::models::Employee;

const NAME_WEIGHT: f32 = 0.7;
const DOB_WEIGHT: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct OwnerMatch {
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub employee_id: Option<Uuid>,
}

impl OwnerMatch {
    fn none() -> Self {
        OwnerMatch {
            confidence: 0.0,
            employee_id: None,
        }
    }
}

/// Resolve the likely owner of a document.
pub fn match_owner(
    conn: &Connection,
    organization_id: &Uuid,
    sender_email: &str,
    extracted_names: &[String],
    extracted_dob: Option<NaiveDate>,
) -> Result<OwnerMatch, DatabaseError> {
    if let Some(employee) = repository::find_employee_by_email(conn, organization_id, sender_email)?
    {
        return Ok(OwnerMatch {
            confidence: 1.0,
            employee_id: Some(employee.id),
        });
    }

    if extracted_names.is_empty() {
        return Ok(OwnerMatch::none());
    }

    let directory = repository::list_employees(conn, organization_id)?;
    let mut best = OwnerMatch::none();

    for employee in &directory {
        let name_score = extracted_names
            .iter()
            .map(|name| name_similarity(name, &employee.full_name))
            .fold(0.0_f32, f32::max);
        if name_score == 0.0 {
            continue;
        }

        let confidence = blend(name_score, extracted_dob, employee);
        if confidence > best.confidence {
            best = OwnerMatch {
                confidence,
                employee_id: Some(employee.id),
            };
        }
    }

    Ok(best)
}

/// Token-overlap similarity between an extracted name and a directory
/// name: the fraction of directory-name tokens present in the extracted
/// name, case-insensitively.
fn name_similarity(extracted: &str, directory_name: &str) -> f32 {
    let extracted_tokens: Vec<String> = tokens(extracted);
    let directory_tokens: Vec<String> = tokens(directory_name);
    if directory_tokens.is_empty() || extracted_tokens.is_empty() {
        return 0.0;
    }

    let matched = directory_tokens
        .iter()
        .filter(|t| extracted_tokens.contains(t))
        .count();
    matched as f32 / directory_tokens.len() as f32
}

fn tokens(name: &str) -> Vec<String> {
    name.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Blend the name score with date-of-birth agreement. Without a DOB on
/// either side the name score stands alone.
fn blend(name_score: f32, extracted_dob: Option<NaiveDate>, employee: &Employee) -> f32 {
    match (extracted_dob, employee.date_of_birth) {
        (Some(doc_dob), Some(emp_dob)) => {
            let dob_score = if doc_dob == emp_dob { 1.0 } else { 0.0 };
            NAME_WEIGHT * name_score + DOB_WEIGHT * dob_score
        }
        _ => name_score,
    }
}
