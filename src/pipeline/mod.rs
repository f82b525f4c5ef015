//! Seven-stage document validation pipeline.
//!
//! extract → classify → owner match → expiry → authenticity → compliance
//! → decision. Each stage folds a partial score or flag into the final
//! `ValidationResult`; the orchestrator in [`validator`] drives the stages
//! and persists the outcome.

pub mod authenticity;
pub mod classifier;
pub mod compliance;
pub mod decision;
pub mod expiry;
pub mod extract;
pub mod owner;
pub mod types;
pub mod validator;

pub use types::{Classification, Classifier, ClassifyContext, TextExtractor};
pub use validator::DocumentValidator;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::lifecycle::LifecycleError;

/// Failure at a collaborator boundary (storage, classification service).
/// The variant decides what the resilience queue does with the job.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Network blip, rate limit or timeout. Retried with backoff.
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Expired or invalid credential. Never retried; needs re-authorization.
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Persistently malformed response. Exhausts retries and dead-letters.
    #[error("Permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Permanent(_))
    }
}

/// Errors that can occur during a validation run.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(Uuid),

    #[error("No storage adapter for provider: {0}")]
    NoStorageAdapter(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

impl ValidationError {
    /// Whether the resilience queue should re-attempt after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            ValidationError::Provider(e) => e.is_retryable(),
            ValidationError::Database(_) => true,
            _ => false,
        }
    }
}
