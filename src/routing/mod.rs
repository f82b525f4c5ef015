//! Routing: decide where an inbound document is stored.
//!
//! A message is matched against the organization's active routing rules
//! (sender pattern + subject pattern, priority-ordered); the winning rule
//! names a storage target and a folder template. No match is not an error —
//! the organization's default target with a date-bucketed folder is used.

pub mod folder;
pub mod matcher;
pub mod normalize;

pub use folder::{resolve_template, FolderContext};
pub use matcher::{route_message, RoutingDecision};
pub use normalize::normalize_subject;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Routing rule {rule_id} references missing storage target {target_id}")]
    MissingTarget { rule_id: String, target_id: String },

    #[error("Organization {0} has no default storage target")]
    NoDefaultTarget(String),

    #[error("Invalid routing pattern: {0}")]
    BadPattern(String),
}
