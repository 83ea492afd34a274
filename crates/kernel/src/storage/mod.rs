//! CMS storage backends.
//!
//! [`CmsStorage`] is implemented by exactly two backends:
//! - [`MemoryStorage`]: process-local maps, used when no database is configured
//! - [`PgStorage`]: PostgreSQL, optionally scoped to the caller's credential
//!
//! [`BackendSelector`] picks one per request. Missing entities are reported as
//! `Ok(None)` / `Ok(false)`, never as errors.

mod memory;
mod postgres;
mod selector;

pub use memory::MemoryStorage;
pub use postgres::{DatabaseRoles, PgStorage};
pub use selector::BackendSelector;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BlogPost, BlogPostFilter, BlogPostPatch, NewBlogPost, NewPageConfig, NewTextContent,
    PageConfig, PageConfigPatch, TextContent, TextContentPatch,
};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A unique natural key is already taken.
    #[error("{entity} with this {field} already exists")]
    Conflict {
        entity: &'static str,
        field: &'static str,
    },

    /// The backend did not answer within the configured deadline.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

/// Which backend served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }
}

/// Credential a durable storage operation runs under.
///
/// `User` carries the JWT claims handed to row-level security policies via
/// `request.jwt.claims`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DbCredential {
    /// Default service/anonymous access.
    #[default]
    Anonymous,

    /// Access scoped to a verified caller.
    User {
        access_token: String,
        claims: serde_json::Value,
    },
}

impl DbCredential {
    pub fn is_user(&self) -> bool {
        matches!(self, DbCredential::User { .. })
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::MemoryStorage {}
    impl Sealed for super::PgStorage {}
}

/// CRUD over text content, blog posts and page configurations.
///
/// Sealed: the only implementors are [`MemoryStorage`] and [`PgStorage`].
#[async_trait]
pub trait CmsStorage: sealed::Sealed + Send + Sync {
    /// Backend kind, for logging and health reporting.
    fn backend(&self) -> StorageBackend;

    // --- Text content ---

    async fn save_text_content(&self, input: NewTextContent) -> StorageResult<TextContent>;

    async fn get_text_content(&self, id: Uuid) -> StorageResult<Option<TextContent>>;

    async fn get_text_content_by_key(&self, key: &str) -> StorageResult<Option<TextContent>>;

    async fn list_text_content(&self) -> StorageResult<Vec<TextContent>>;

    async fn update_text_content(
        &self,
        id: Uuid,
        patch: TextContentPatch,
    ) -> StorageResult<Option<TextContent>>;

    async fn delete_text_content(&self, id: Uuid) -> StorageResult<bool>;

    // --- Blog posts ---

    async fn save_blog_post(&self, input: NewBlogPost) -> StorageResult<BlogPost>;

    async fn get_blog_post(&self, id: Uuid) -> StorageResult<Option<BlogPost>>;

    async fn get_blog_post_by_slug(&self, slug: &str) -> StorageResult<Option<BlogPost>>;

    async fn list_blog_posts(&self, filter: BlogPostFilter) -> StorageResult<Vec<BlogPost>>;

    async fn update_blog_post(
        &self,
        id: Uuid,
        patch: BlogPostPatch,
    ) -> StorageResult<Option<BlogPost>>;

    async fn delete_blog_post(&self, id: Uuid) -> StorageResult<bool>;

    // --- Page configurations ---

    async fn save_page_config(&self, input: NewPageConfig) -> StorageResult<PageConfig>;

    async fn get_page_config(&self, id: Uuid) -> StorageResult<Option<PageConfig>>;

    async fn get_page_config_by_key(&self, page_key: &str)
    -> StorageResult<Option<PageConfig>>;

    async fn list_page_configs(&self) -> StorageResult<Vec<PageConfig>>;

    async fn update_page_config(
        &self,
        id: Uuid,
        patch: PageConfigPatch,
    ) -> StorageResult<Option<PageConfig>>;

    async fn delete_page_config(&self, id: Uuid) -> StorageResult<bool>;
}
