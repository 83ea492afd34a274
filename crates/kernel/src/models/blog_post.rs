//! Blog post model.
//!
//! Publication is one-way for `published_at`: the first time a post becomes
//! published the timestamp is recorded, and later updates never touch it,
//! including unpublishing and republishing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author id recorded when a post is created without a derived identity.
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// Blog post record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub title: String,

    /// Unique natural key used in URLs.
    pub slug: String,

    /// Sanitized rich text.
    pub content: String,

    pub excerpt: Option<String>,

    /// Identity-provider user id of the author, or [`UNKNOWN_AUTHOR`].
    pub author_id: String,

    pub published: bool,

    /// Set once, on the first transition to published.
    pub published_at: Option<DateTime<Utc>>,

    pub tags: Option<Vec<String>>,

    pub featured_image: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a blog post.
#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub author_id: String,
    pub published: bool,
    pub tags: Option<Vec<String>>,
    pub featured_image: Option<String>,
}

/// Partial update for a blog post. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub published: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub featured_image: Option<String>,
}

/// Filter for listing blog posts.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct BlogPostFilter {
    pub published: Option<bool>,
}

impl BlogPostFilter {
    /// Check whether a post passes this filter.
    pub fn matches(&self, post: &BlogPost) -> bool {
        self.published.is_none_or(|published| post.published == published)
    }
}

impl BlogPost {
    /// Build a new record. A post created as published gets `published_at`
    /// equal to its creation time.
    pub fn create(input: NewBlogPost, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: input.title,
            slug: input.slug,
            content: input.content,
            excerpt: input.excerpt,
            author_id: input.author_id,
            published: input.published,
            published_at: input.published.then_some(now),
            tags: input.tags,
            featured_image: input.featured_image,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a patch onto this record and refresh `updated_at`.
    pub fn apply(&mut self, patch: BlogPostPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(excerpt) = patch.excerpt {
            self.excerpt = Some(excerpt);
        }
        if let Some(tags) = patch.tags {
            self.tags = Some(tags);
        }
        if let Some(featured_image) = patch.featured_image {
            self.featured_image = Some(featured_image);
        }
        if let Some(published) = patch.published {
            if published && self.published_at.is_none() {
                self.published_at = Some(now);
            }
            self.published = published;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> NewBlogPost {
        NewBlogPost {
            title: "Hello".to_string(),
            slug: "hello".to_string(),
            content: "<p>Hi</p>".to_string(),
            excerpt: None,
            author_id: UNKNOWN_AUTHOR.to_string(),
            published: false,
            tags: None,
            featured_image: None,
        }
    }

    #[test]
    fn created_published_gets_creation_time() {
        let now = Utc::now();
        let post = BlogPost::create(
            NewBlogPost {
                published: true,
                ..draft()
            },
            now,
        );
        assert_eq!(post.published_at, Some(now));
        assert_eq!(post.created_at, post.updated_at);
    }

    #[test]
    fn first_publish_sets_timestamp_once() {
        let created = Utc::now();
        let mut post = BlogPost::create(draft(), created);
        assert_eq!(post.published_at, None);

        let first = created + Duration::seconds(10);
        post.apply(
            BlogPostPatch {
                published: Some(true),
                ..Default::default()
            },
            first,
        );
        assert_eq!(post.published_at, Some(first));

        let again = first + Duration::seconds(10);
        post.apply(
            BlogPostPatch {
                published: Some(true),
                ..Default::default()
            },
            again,
        );
        assert_eq!(post.published_at, Some(first));
        assert_eq!(post.updated_at, again);
    }

    #[test]
    fn unpublish_keeps_timestamp() {
        let created = Utc::now();
        let mut post = BlogPost::create(
            NewBlogPost {
                published: true,
                ..draft()
            },
            created,
        );

        post.apply(
            BlogPostPatch {
                published: Some(false),
                ..Default::default()
            },
            created + Duration::seconds(5),
        );
        assert!(!post.published);
        assert_eq!(post.published_at, Some(created));

        post.apply(
            BlogPostPatch {
                published: Some(true),
                ..Default::default()
            },
            created + Duration::seconds(9),
        );
        assert_eq!(post.published_at, Some(created));
    }

    #[test]
    fn unspecified_fields_are_retained() {
        let created = Utc::now();
        let mut post = BlogPost::create(
            NewBlogPost {
                excerpt: Some("short".to_string()),
                tags: Some(vec!["a".to_string()]),
                ..draft()
            },
            created,
        );
        post.apply(
            BlogPostPatch {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
            created + Duration::seconds(1),
        );
        assert_eq!(post.title, "Renamed");
        assert_eq!(post.slug, "hello");
        assert_eq!(post.excerpt.as_deref(), Some("short"));
        assert_eq!(post.tags, Some(vec!["a".to_string()]));
        assert_eq!(post.created_at, created);
    }

    #[test]
    fn filter_matches_publication_state() {
        let post = BlogPost::create(draft(), Utc::now());
        assert!(BlogPostFilter::default().matches(&post));
        assert!(BlogPostFilter { published: Some(false) }.matches(&post));
        assert!(!BlogPostFilter { published: Some(true) }.matches(&post));
    }

    #[test]
    fn serializes_camel_case() {
        let post = BlogPost::create(draft(), Utc::now());
        let json = serde_json::to_value(&post).unwrap();
        assert!(json.get("authorId").is_some());
        assert!(json.get("publishedAt").is_some());
        assert!(json.get("featuredImage").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
