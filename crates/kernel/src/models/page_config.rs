//! Page configuration model.
//!
//! `config` is trusted structured data and is stored as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Unique natural key.
    pub page_key: String,

    pub title: String,

    pub description: Option<String>,

    /// Arbitrary key-value payload (JSONB).
    pub config: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a page configuration.
#[derive(Debug, Clone)]
pub struct NewPageConfig {
    pub page_key: String,
    pub title: String,
    pub description: Option<String>,
    pub config: serde_json::Value,
}

/// Partial update for a page configuration. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PageConfigPatch {
    pub page_key: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub config: Option<serde_json::Value>,
}

impl PageConfig {
    /// Build a new record with a fresh id and equal timestamps.
    pub fn create(input: NewPageConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            page_key: input.page_key,
            title: input.title,
            description: input.description,
            config: input.config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch onto this record and refresh `updated_at`.
    pub fn apply(&mut self, patch: PageConfigPatch, now: DateTime<Utc>) {
        if let Some(page_key) = patch.page_key {
            self.page_key = page_key;
        }
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(config) = patch.config {
            self.config = config;
        }
        self.updated_at = now;
    }
}
