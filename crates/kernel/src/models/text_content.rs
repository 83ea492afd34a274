//! Text content model.
//!
//! Freeform rich-text snippets addressed by a unique, human-chosen key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text content record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Unique natural key.
    pub key: String,

    /// Sanitized rich text.
    pub content: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating text content.
#[derive(Debug, Clone)]
pub struct NewTextContent {
    pub key: String,
    pub content: String,
}

/// Partial update for text content. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TextContentPatch {
    pub key: Option<String>,
    pub content: Option<String>,
}

impl TextContent {
    /// Build a new record with a fresh id and equal timestamps.
    pub fn create(input: NewTextContent, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            key: input.key,
            content: input.content,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch onto this record and refresh `updated_at`.
    pub fn apply(&mut self, patch: TextContentPatch, now: DateTime<Utc>) {
        if let Some(key) = patch.key {
            self.key = key;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        self.updated_at = now;
    }
}
