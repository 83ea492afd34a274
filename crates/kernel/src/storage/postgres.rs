//! PostgreSQL storage backend.
//!
//! Every operation runs in its own transaction. Before the first statement the
//! transaction is scoped to the caller: verified callers have their JWT claims
//! published through `request.jwt.claims` (what row-level security policies
//! read), and the configured role for the caller class is assumed with
//! `SET LOCAL ROLE`. Both settings end with the transaction, so pooled
//! connections never leak one caller's scope into another request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{CmsStorage, DbCredential, StorageBackend, StorageError, StorageResult};
use crate::models::{
    BlogPost, BlogPostFilter, BlogPostPatch, NewBlogPost, NewPageConfig, NewTextContent,
    PageConfig, PageConfigPatch, TextContent, TextContentPatch, timestamp_now,
};

/// Database roles assumed per caller class. `None` keeps the pool's login role.
#[derive(Debug, Clone, Default)]
pub struct DatabaseRoles {
    pub anonymous: Option<String>,
    pub authenticated: Option<String>,
}

/// Entity label and natural key, used to describe unique violations.
#[derive(Debug, Clone, Copy)]
struct Entity {
    name: &'static str,
    natural_key: &'static str,
}

const TEXT_CONTENT: Entity = Entity {
    name: "Text content",
    natural_key: "key",
};

const BLOG_POST: Entity = Entity {
    name: "Blog post",
    natural_key: "slug",
};

const PAGE_CONFIG: Entity = Entity {
    name: "Page config",
    natural_key: "page key",
};

/// Durable storage bound to one caller's credential.
///
/// Cheap to construct: the pool and role settings are shared.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
    credential: DbCredential,
    roles: Arc<DatabaseRoles>,
    timeout: Duration,
}

impl PgStorage {
    pub fn new(
        pool: PgPool,
        credential: DbCredential,
        roles: Arc<DatabaseRoles>,
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            credential,
            roles,
            timeout,
        }
    }

    /// Begin a transaction scoped to this storage's credential.
    async fn begin_scoped(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let role = match &self.credential {
            DbCredential::Anonymous => self.roles.anonymous.as_deref(),
            DbCredential::User { claims, .. } => {
                sqlx::query("SELECT set_config('request.jwt.claims', $1, true)")
                    .bind(claims.to_string())
                    .execute(&mut *tx)
                    .await?;
                self.roles.authenticated.as_deref()
            }
        };

        // Role names are validated as plain identifiers when configuration loads.
        if let Some(role) = role {
            let statement = format!("SET LOCAL ROLE \"{role}\"");
            sqlx::query(&statement).execute(&mut *tx).await?;
        }

        Ok(tx)
    }

    /// Run a database operation under the configured deadline, mapping
    /// unique violations to [`StorageError::Conflict`].
    async fn run<T, F>(&self, entity: Entity, operation: F) -> StorageResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(sqlx::Error::Database(db_err))) if db_err.is_unique_violation() => {
                debug!(
                    entity = entity.name,
                    constraint = db_err.constraint().unwrap_or_default(),
                    "unique violation"
                );
                Err(StorageError::Conflict {
                    entity: entity.name,
                    field: entity.natural_key,
                })
            }
            Ok(Err(e)) => Err(StorageError::Database(e)),
            Err(_) => Err(StorageError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl CmsStorage for PgStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Postgres
    }

    // --- Text content ---

    async fn save_text_content(&self, input: NewTextContent) -> StorageResult<TextContent> {
        let record = TextContent::create(input, timestamp_now());
        let saved = self
            .run(TEXT_CONTENT, async {
                let mut tx = self.begin_scoped().await?;
                let saved = sqlx::query_as::<_, TextContent>(
                    r#"
                    INSERT INTO text_content (id, key, content, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING id, key, content, created_at, updated_at
                    "#,
                )
                .bind(record.id)
                .bind(&record.key)
                .bind(&record.content)
                .bind(record.created_at)
                .bind(record.updated_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(saved)
            })
            .await?;

        debug!(id = %saved.id, key = %saved.key, "saved text content");
        Ok(saved)
    }

    async fn get_text_content(&self, id: Uuid) -> StorageResult<Option<TextContent>> {
        self.run(TEXT_CONTENT, async {
            let mut tx = self.begin_scoped().await?;
            let found = sqlx::query_as::<_, TextContent>(
                "SELECT id, key, content, created_at, updated_at FROM text_content WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(found)
        })
        .await
    }

    async fn get_text_content_by_key(&self, key: &str) -> StorageResult<Option<TextContent>> {
        self.run(TEXT_CONTENT, async {
            let mut tx = self.begin_scoped().await?;
            let found = sqlx::query_as::<_, TextContent>(
                "SELECT id, key, content, created_at, updated_at FROM text_content WHERE key = $1",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(found)
        })
        .await
    }

    async fn list_text_content(&self) -> StorageResult<Vec<TextContent>> {
        self.run(TEXT_CONTENT, async {
            let mut tx = self.begin_scoped().await?;
            let rows = sqlx::query_as::<_, TextContent>(
                r#"
                SELECT id, key, content, created_at, updated_at
                FROM text_content
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(rows)
        })
        .await
    }

    async fn update_text_content(
        &self,
        id: Uuid,
        patch: TextContentPatch,
    ) -> StorageResult<Option<TextContent>> {
        let updated = self
            .run(TEXT_CONTENT, async {
                let mut tx = self.begin_scoped().await?;
                let current = sqlx::query_as::<_, TextContent>(
                    r#"
                    SELECT id, key, content, created_at, updated_at
                    FROM text_content WHERE id = $1
                    FOR UPDATE
                    "#,
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

                let Some(mut record) = current else {
                    return Ok(None);
                };
                record.apply(patch, timestamp_now());

                let saved = sqlx::query_as::<_, TextContent>(
                    r#"
                    UPDATE text_content SET key = $2, content = $3, updated_at = $4
                    WHERE id = $1
                    RETURNING id, key, content, created_at, updated_at
                    "#,
                )
                .bind(record.id)
                .bind(&record.key)
                .bind(&record.content)
                .bind(record.updated_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(Some(saved))
            })
            .await?;

        if updated.is_some() {
            debug!(id = %id, "updated text content");
        }
        Ok(updated)
    }

    async fn delete_text_content(&self, id: Uuid) -> StorageResult<bool> {
        self.run(TEXT_CONTENT, async {
            let mut tx = self.begin_scoped().await?;
            let result = sqlx::query("DELETE FROM text_content WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    // --- Blog posts ---

    async fn save_blog_post(&self, input: NewBlogPost) -> StorageResult<BlogPost> {
        let record = BlogPost::create(input, timestamp_now());
        let saved = self
            .run(BLOG_POST, async {
                let mut tx = self.begin_scoped().await?;
                let saved = sqlx::query_as::<_, BlogPost>(
                    r#"
                    INSERT INTO blog_posts (
                        id, title, slug, content, excerpt, author_id, published,
                        published_at, tags, featured_image, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    RETURNING id, title, slug, content, excerpt, author_id, published,
                        published_at, tags, featured_image, created_at, updated_at
                    "#,
                )
                .bind(record.id)
                .bind(&record.title)
                .bind(&record.slug)
                .bind(&record.content)
                .bind(&record.excerpt)
                .bind(&record.author_id)
                .bind(record.published)
                .bind(record.published_at)
                .bind(&record.tags)
                .bind(&record.featured_image)
                .bind(record.created_at)
                .bind(record.updated_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(saved)
            })
            .await?;

        debug!(id = %saved.id, slug = %saved.slug, published = saved.published, "saved blog post");
        Ok(saved)
    }

    async fn get_blog_post(&self, id: Uuid) -> StorageResult<Option<BlogPost>> {
        self.run(BLOG_POST, async {
            let mut tx = self.begin_scoped().await?;
            let found = sqlx::query_as::<_, BlogPost>(
                r#"
                SELECT id, title, slug, content, excerpt, author_id, published,
                    published_at, tags, featured_image, created_at, updated_at
                FROM blog_posts WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(found)
        })
        .await
    }

    async fn get_blog_post_by_slug(&self, slug: &str) -> StorageResult<Option<BlogPost>> {
        self.run(BLOG_POST, async {
            let mut tx = self.begin_scoped().await?;
            let found = sqlx::query_as::<_, BlogPost>(
                r#"
                SELECT id, title, slug, content, excerpt, author_id, published,
                    published_at, tags, featured_image, created_at, updated_at
                FROM blog_posts WHERE slug = $1
                "#,
            )
            .bind(slug)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(found)
        })
        .await
    }

    async fn list_blog_posts(&self, filter: BlogPostFilter) -> StorageResult<Vec<BlogPost>> {
        self.run(BLOG_POST, async {
            let mut tx = self.begin_scoped().await?;
            let rows = sqlx::query_as::<_, BlogPost>(
                r#"
                SELECT id, title, slug, content, excerpt, author_id, published,
                    published_at, tags, featured_image, created_at, updated_at
                FROM blog_posts
                WHERE ($1::boolean IS NULL OR published = $1)
                ORDER BY created_at DESC
                "#,
            )
            .bind(filter.published)
            .fetch_all(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(rows)
        })
        .await
    }

    async fn update_blog_post(
        &self,
        id: Uuid,
        patch: BlogPostPatch,
    ) -> StorageResult<Option<BlogPost>> {
        let updated = self
            .run(BLOG_POST, async {
                let mut tx = self.begin_scoped().await?;

                // Row lock keeps the publish-once check and the write atomic.
                let current = sqlx::query_as::<_, BlogPost>(
                    r#"
                    SELECT id, title, slug, content, excerpt, author_id, published,
                        published_at, tags, featured_image, created_at, updated_at
                    FROM blog_posts WHERE id = $1
                    FOR UPDATE
                    "#,
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

                let Some(mut record) = current else {
                    return Ok(None);
                };
                record.apply(patch, timestamp_now());

                let saved = sqlx::query_as::<_, BlogPost>(
                    r#"
                    UPDATE blog_posts SET
                        title = $2, slug = $3, content = $4, excerpt = $5,
                        published = $6, published_at = $7, tags = $8,
                        featured_image = $9, updated_at = $10
                    WHERE id = $1
                    RETURNING id, title, slug, content, excerpt, author_id, published,
                        published_at, tags, featured_image, created_at, updated_at
                    "#,
                )
                .bind(record.id)
                .bind(&record.title)
                .bind(&record.slug)
                .bind(&record.content)
                .bind(&record.excerpt)
                .bind(record.published)
                .bind(record.published_at)
                .bind(&record.tags)
                .bind(&record.featured_image)
                .bind(record.updated_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(Some(saved))
            })
            .await?;

        if let Some(post) = &updated {
            debug!(id = %post.id, published = post.published, "updated blog post");
        }
        Ok(updated)
    }

    async fn delete_blog_post(&self, id: Uuid) -> StorageResult<bool> {
        self.run(BLOG_POST, async {
            let mut tx = self.begin_scoped().await?;
            let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    // --- Page configurations ---

    async fn save_page_config(&self, input: NewPageConfig) -> StorageResult<PageConfig> {
        let record = PageConfig::create(input, timestamp_now());
        let saved = self
            .run(PAGE_CONFIG, async {
                let mut tx = self.begin_scoped().await?;
                let saved = sqlx::query_as::<_, PageConfig>(
                    r#"
                    INSERT INTO page_configs (
                        id, page_key, title, description, config, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING id, page_key, title, description, config, created_at, updated_at
                    "#,
                )
                .bind(record.id)
                .bind(&record.page_key)
                .bind(&record.title)
                .bind(&record.description)
                .bind(&record.config)
                .bind(record.created_at)
                .bind(record.updated_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(saved)
            })
            .await?;

        debug!(id = %saved.id, page_key = %saved.page_key, "saved page config");
        Ok(saved)
    }

    async fn get_page_config(&self, id: Uuid) -> StorageResult<Option<PageConfig>> {
        self.run(PAGE_CONFIG, async {
            let mut tx = self.begin_scoped().await?;
            let found = sqlx::query_as::<_, PageConfig>(
                r#"
                SELECT id, page_key, title, description, config, created_at, updated_at
                FROM page_configs WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(found)
        })
        .await
    }

    async fn get_page_config_by_key(
        &self,
        page_key: &str,
    ) -> StorageResult<Option<PageConfig>> {
        self.run(PAGE_CONFIG, async {
            let mut tx = self.begin_scoped().await?;
            let found = sqlx::query_as::<_, PageConfig>(
                r#"
                SELECT id, page_key, title, description, config, created_at, updated_at
                FROM page_configs WHERE page_key = $1
                "#,
            )
            .bind(page_key)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(found)
        })
        .await
    }

    async fn list_page_configs(&self) -> StorageResult<Vec<PageConfig>> {
        self.run(PAGE_CONFIG, async {
            let mut tx = self.begin_scoped().await?;
            let rows = sqlx::query_as::<_, PageConfig>(
                r#"
                SELECT id, page_key, title, description, config, created_at, updated_at
                FROM page_configs
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(rows)
        })
        .await
    }

    async fn update_page_config(
        &self,
        id: Uuid,
        patch: PageConfigPatch,
    ) -> StorageResult<Option<PageConfig>> {
        let updated = self
            .run(PAGE_CONFIG, async {
                let mut tx = self.begin_scoped().await?;
                let current = sqlx::query_as::<_, PageConfig>(
                    r#"
                    SELECT id, page_key, title, description, config, created_at, updated_at
                    FROM page_configs WHERE id = $1
                    FOR UPDATE
                    "#,
                )
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

                let Some(mut record) = current else {
                    return Ok(None);
                };
                record.apply(patch, timestamp_now());

                let saved = sqlx::query_as::<_, PageConfig>(
                    r#"
                    UPDATE page_configs SET
                        page_key = $2, title = $3, description = $4, config = $5,
                        updated_at = $6
                    WHERE id = $1
                    RETURNING id, page_key, title, description, config, created_at, updated_at
                    "#,
                )
                .bind(record.id)
                .bind(&record.page_key)
                .bind(&record.title)
                .bind(&record.description)
                .bind(&record.config)
                .bind(record.updated_at)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(Some(saved))
            })
            .await?;

        if updated.is_some() {
            debug!(id = %id, "updated page config");
        }
        Ok(updated)
    }

    async fn delete_page_config(&self, id: Uuid) -> StorageResult<bool> {
        self.run(PAGE_CONFIG, async {
            let mut tx = self.begin_scoped().await?;
            let result = sqlx::query("DELETE FROM page_configs WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}
