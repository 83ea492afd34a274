//! In-memory storage backend.
//!
//! Used when no database is configured. Data lives for the lifetime of the
//! process. Each entity kind sits in its own `DashMap`, so a read-modify-write
//! on one record (including the publish-once rule) happens under that
//! record's shard lock.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CmsStorage, StorageBackend, StorageResult};
use crate::models::{
    BlogPost, BlogPostFilter, BlogPostPatch, NewBlogPost, NewPageConfig, NewTextContent,
    PageConfig, PageConfigPatch, TextContent, TextContentPatch, timestamp_now,
};

/// Ephemeral storage. List order is unspecified.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    text_content: DashMap<Uuid, TextContent>,
    blog_posts: DashMap<Uuid, BlogPost>,
    page_configs: DashMap<Uuid, PageConfig>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Clone the first value matching `predicate`.
fn find_by<T: Clone>(map: &DashMap<Uuid, T>, predicate: impl Fn(&T) -> bool) -> Option<T> {
    map.iter()
        .find(|entry| predicate(entry.value()))
        .map(|entry| entry.value().clone())
}

#[async_trait]
impl CmsStorage for MemoryStorage {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    async fn save_text_content(&self, input: NewTextContent) -> StorageResult<TextContent> {
        let record = TextContent::create(input, timestamp_now());
        self.text_content.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_text_content(&self, id: Uuid) -> StorageResult<Option<TextContent>> {
        Ok(self.text_content.get(&id).map(|entry| entry.clone()))
    }

    async fn get_text_content_by_key(&self, key: &str) -> StorageResult<Option<TextContent>> {
        Ok(find_by(&self.text_content, |record| record.key == key))
    }

    async fn list_text_content(&self) -> StorageResult<Vec<TextContent>> {
        Ok(self
            .text_content
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_text_content(
        &self,
        id: Uuid,
        patch: TextContentPatch,
    ) -> StorageResult<Option<TextContent>> {
        let Some(mut record) = self.text_content.get_mut(&id) else {
            return Ok(None);
        };
        record.apply(patch, timestamp_now());
        Ok(Some(record.clone()))
    }

    async fn delete_text_content(&self, id: Uuid) -> StorageResult<bool> {
        Ok(self.text_content.remove(&id).is_some())
    }

    async fn save_blog_post(&self, input: NewBlogPost) -> StorageResult<BlogPost> {
        let record = BlogPost::create(input, timestamp_now());
        self.blog_posts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_blog_post(&self, id: Uuid) -> StorageResult<Option<BlogPost>> {
        Ok(self.blog_posts.get(&id).map(|entry| entry.clone()))
    }

    async fn get_blog_post_by_slug(&self, slug: &str) -> StorageResult<Option<BlogPost>> {
        Ok(find_by(&self.blog_posts, |record| record.slug == slug))
    }

    async fn list_blog_posts(&self, filter: BlogPostFilter) -> StorageResult<Vec<BlogPost>> {
        Ok(self
            .blog_posts
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_blog_post(
        &self,
        id: Uuid,
        patch: BlogPostPatch,
    ) -> StorageResult<Option<BlogPost>> {
        let Some(mut record) = self.blog_posts.get_mut(&id) else {
            return Ok(None);
        };
        record.apply(patch, timestamp_now());
        Ok(Some(record.clone()))
    }

    async fn delete_blog_post(&self, id: Uuid) -> StorageResult<bool> {
        Ok(self.blog_posts.remove(&id).is_some())
    }

    async fn save_page_config(&self, input: NewPageConfig) -> StorageResult<PageConfig> {
        let record = PageConfig::create(input, timestamp_now());
        self.page_configs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_page_config(&self, id: Uuid) -> StorageResult<Option<PageConfig>> {
        Ok(self.page_configs.get(&id).map(|entry| entry.clone()))
    }

    async fn get_page_config_by_key(
        &self,
        page_key: &str,
    ) -> StorageResult<Option<PageConfig>> {
        Ok(find_by(&self.page_configs, |record| record.page_key == page_key))
    }

    async fn list_page_configs(&self) -> StorageResult<Vec<PageConfig>> {
        Ok(self
            .page_configs
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_page_config(
        &self,
        id: Uuid,
        patch: PageConfigPatch,
    ) -> StorageResult<Option<PageConfig>> {
        let Some(mut record) = self.page_configs.get_mut(&id) else {
            return Ok(None);
        };
        record.apply(patch, timestamp_now());
        Ok(Some(record.clone()))
    }

    async fn delete_page_config(&self, id: Uuid) -> StorageResult<bool> {
        Ok(self.page_configs.remove(&id).is_some())
    }
}
