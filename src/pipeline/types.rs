//! Collaborator traits and exchange types for the validation pipeline.
//!
//! Trait-based DI so the orchestrator stays testable with mock
//! implementations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ProviderError;

/// Request context handed to the classifier as hints. All fields optional;
/// an unlinked document classifies without them.
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext<'a> {
    pub requested_type: Option<&'a str>,
    pub due_date: Option<NaiveDate>,
    pub filename: &'a str,
}

/// Normalized output of the classification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Lowercase type label; `"unknown"` when the service could not tell.
    pub document_type: String,
    /// Clamped to [0, 1].
    pub confidence: f32,
    pub expiry_date: Option<NaiveDate>,
    pub issue_date: Option<NaiveDate>,
    /// Person names found in the document, for owner matching.
    pub extracted_names: Vec<String>,
    pub extracted_date_of_birth: Option<NaiveDate>,
}

impl Classification {
    pub fn unknown() -> Self {
        Classification {
            document_type: "unknown".to_string(),
            confidence: 0.0,
            expiry_date: None,
            issue_date: None,
            extracted_names: Vec::new(),
            extracted_date_of_birth: None,
        }
    }

    /// Normalize a raw collaborator response in place: clamp confidence,
    /// map an empty type label to the `"unknown"` sentinel. Out-of-range
    /// values are corrected, never rejected.
    pub fn normalize(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        let trimmed = self.document_type.trim().to_lowercase();
        self.document_type = if trimmed.is_empty() {
            "unknown".to_string()
        } else {
            trimmed
        };
        self
    }
}

/// Best-effort text extraction. `Ok(None)` means "no text available" and
/// is not an error; downstream stages degrade to filename-only evidence.
pub trait TextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<Option<String>, ProviderError>;
}

/// The external classification service.
pub trait Classifier {
    fn classify(
        &self,
        text: &str,
        context: &ClassifyContext<'_>,
    ) -> Result<Classification, ProviderError>;

    /// Model identifier recorded in results and audit rows.
    fn model_name(&self) -> &str;
}
