use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::StorageProvider;

/// A place documents can be stored, keyed by a provider discriminator.
/// Each organization has exactly one default target (routing fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageTarget {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub provider: StorageProvider,
    pub root_path: String,
    pub is_default: bool,
    pub created_at: NaiveDateTime,
}
