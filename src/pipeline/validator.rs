//! Pipeline orchestrator.
//!
//! Drives the seven stages for one document, persists the result, and
//! re-drives the request lifecycle. Pure pipeline logic with trait-based
//! DI; queueing, audit rows and rate limiting live in the callers.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::authenticity::check_authenticity;
use super::compliance::compliance_score;
use super::decision::{decide, DecisionInput};
use super::expiry::{classify_expiry, schedule_renewal_reminders};
use super::owner::match_owner;
use super::types::{Classifier, ClassifyContext, TextExtractor};
use super::{ProviderError, ValidationError};
use crate::db::repository;
use crate::lifecycle;
use crate::models::enums::ExpiryStatus;
use crate::models::{DocumentRequest, ValidationResult};
use crate::storage::StorageSet;

const LIFECYCLE_ACTOR: &str = "validation-pipeline";

pub struct DocumentValidator {
    storage: StorageSet,
    extractor: Box<dyn TextExtractor + Send + Sync>,
    classifier: Box<dyn Classifier + Send + Sync>,
    expiring_horizon_days: i64,
}

impl DocumentValidator {
    pub fn new(
        storage: StorageSet,
        extractor: Box<dyn TextExtractor + Send + Sync>,
        classifier: Box<dyn Classifier + Send + Sync>,
    ) -> Self {
        Self {
            storage,
            extractor,
            classifier,
            expiring_horizon_days: crate::config::DEFAULT_EXPIRING_HORIZON_DAYS,
        }
    }

    pub fn with_horizon(mut self, days: i64) -> Self {
        self.expiring_horizon_days = days;
        self
    }

    pub fn model_name(&self) -> &str {
        self.classifier.model_name()
    }

    /// Run the full pipeline for one document. A pre-existing result is
    /// superseded; reminders already scheduled are not duplicated.
    pub fn validate(
        &self,
        conn: &Connection,
        document_id: &Uuid,
        today: NaiveDate,
    ) -> Result<ValidationResult, ValidationError> {
        let document = repository::get_document(conn, document_id)?
            .ok_or(ValidationError::DocumentNotFound(*document_id))?;
        let org = repository::get_organization(conn, &document.organization_id)?
            .ok_or(ValidationError::OrganizationNotFound(document.organization_id))?;
        let request = match document.request_id {
            Some(request_id) => repository::get_request(conn, &request_id)?,
            None => None,
        };

        let adapter = self
            .storage
            .adapter_for(document.storage_provider)
            .ok_or_else(|| {
                ValidationError::NoStorageAdapter(document.storage_provider.as_str().into())
            })?;
        let bytes = adapter.download_file(&document.storage_path)?;

        // Stage 1: best-effort text extraction. Failure degrades, never aborts.
        let text = match self.extractor.extract(&bytes, &document.filename) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(document_id = %document_id, error = %e, "Text extraction failed");
                None
            }
        };

        // Stage 2: classification. Collaborator failures bubble up so the
        // queue can apply its retry policy.
        let context = classify_context(&request, &document.filename);
        let classification = self
            .classifier
            .classify(text.as_deref().unwrap_or(""), &context)?;

        // Stage 3: owner matching.
        let owner = match_owner(
            conn,
            &document.organization_id,
            &document.sender_email,
            &classification.extracted_names,
            classification.extracted_date_of_birth,
        )?;

        // Stage 4: expiry analysis and reminder scheduling.
        let expiry_status = classify_expiry(
            classification.expiry_date,
            today,
            self.expiring_horizon_days,
        );
        if let Some(expiry) = classification.expiry_date {
            schedule_renewal_reminders(conn, document_id, expiry, today)?;
        }

        // Stage 5: authenticity and duplicates.
        let authenticity = check_authenticity(conn, &document, &bytes, org.strict_duplicates)?;
        let critical_issues = authenticity.critical_issues.clone();
        let mut warnings = authenticity.warnings.clone();

        // Stage 6: compliance against the requested type.
        let requested_type = request.as_ref().and_then(|r| r.requested_type.as_deref());
        let compliance = compliance_score(&classification.document_type, requested_type);

        if expiry_status == ExpiryStatus::Expired {
            warnings.push("Document is expired".to_string());
        }

        // Stage 7: decision.
        let verdict = decide(
            &org,
            &DecisionInput {
                owner_confidence: owner.confidence,
                authenticity_score: authenticity.score,
                compliance_score: compliance,
                expiry_status,
                type_was_requested: requested_type.is_some(),
                critical_issues: &critical_issues,
            },
        );

        let result = ValidationResult {
            id: Uuid::new_v4(),
            document_id: *document_id,
            document_type: classification.document_type,
            type_confidence: classification.confidence,
            owner_confidence: owner.confidence,
            matched_employee_id: owner.employee_id,
            expiry_date: classification.expiry_date,
            expiry_status,
            authenticity_score: authenticity.score,
            is_duplicate: authenticity.is_duplicate,
            compliance_score: compliance,
            verdict,
            critical_issues,
            warnings,
            model_name: self.classifier.model_name().to_string(),
            validated_at: Utc::now().naive_utc(),
        };

        repository::upsert_validation_result(conn, &result)?;
        repository::set_document_validation_status(conn, document_id, verdict.into())?;

        tracing::info!(
            document_id = %document_id,
            verdict = verdict.as_str(),
            document_type = %result.document_type,
            owner = owner.confidence,
            authenticity = authenticity.score,
            compliance,
            "Validation completed"
        );

        if let Some(request) = &request {
            lifecycle::reevaluate(conn, &request.id, LIFECYCLE_ACTOR)?;
        }

        Ok(result)
    }
}

fn classify_context<'a>(
    request: &'a Option<DocumentRequest>,
    filename: &'a str,
) -> ClassifyContext<'a> {
    ClassifyContext {
        requested_type: request.as_ref().and_then(|r| r.requested_type.as_deref()),
        due_date: request.as_ref().map(|r| r.due_date),
        filename,
    }
}

/// Convenience constructor: default local stack with an HTTP classifier.
pub fn default_validator(
    storage: StorageSet,
    classifier_url: &str,
    model: &str,
) -> Result<DocumentValidator, ProviderError> {
    let classifier = super::classifier::HttpClassifier::new(
        classifier_url,
        model,
        crate::config::DEFAULT_CLASSIFIER_TIMEOUT_SECS,
    )?;
    Ok(DocumentValidator::new(
        storage,
        Box::new(super::extract::PlainTextExtractor),
        Box::new(classifier),
    ))
}
