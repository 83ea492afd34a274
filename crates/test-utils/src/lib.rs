//! Inkstand test utilities.
//!
//! Request payload builders for integration tests. Each builder starts from
//! a valid payload with a unique natural key, so tests only spell out the
//! fields they care about.

use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

/// Suffix that keeps keys and slugs unique across tests sharing a backend.
fn unique_suffix() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Create a text content payload with a unique key.
pub fn text_content(content: &str) -> TestTextContent {
    TestTextContent {
        key: format!("test-text-{}", unique_suffix()),
        content: content.to_string(),
        extra: Map::new(),
    }
}

/// Builder for `POST /api/text-content` bodies.
#[derive(Debug, Clone)]
pub struct TestTextContent {
    pub key: String,
    pub content: String,
    extra: Map<String, JsonValue>,
}

impl TestTextContent {
    /// Set a custom key.
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    /// Set an arbitrary extra field, for malformed-input tests.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> JsonValue {
        let mut body = json!({ "key": self.key, "content": self.content });
        merge(&mut body, self.extra);
        body
    }
}

/// Create a blog post payload with a unique slug.
pub fn blog_post(title: &str) -> TestBlogPost {
    TestBlogPost {
        slug: format!("test-post-{}", unique_suffix()),
        title: title.to_string(),
        content: "<p>Body</p>".to_string(),
        excerpt: None,
        featured_image: None,
        tags: Vec::new(),
        published: false,
        extra: Map::new(),
    }
}

/// Builder for `POST /api/blog-posts` bodies.
#[derive(Debug, Clone)]
pub struct TestBlogPost {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub tags: Vec<String>,
    pub published: bool,
    extra: Map<String, JsonValue>,
}

impl TestBlogPost {
    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn with_excerpt(mut self, excerpt: &str) -> Self {
        self.excerpt = Some(excerpt.to_string());
        self
    }

    pub fn with_featured_image(mut self, url: &str) -> Self {
        self.featured_image = Some(url.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Mark the post as published on creation.
    pub fn published(mut self) -> Self {
        self.published = true;
        self
    }

    /// Set an arbitrary extra field, for malformed-input tests.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> JsonValue {
        let mut body = json!({
            "slug": self.slug,
            "title": self.title,
            "content": self.content,
            "tags": self.tags,
            "published": self.published,
        });
        if let Some(excerpt) = self.excerpt {
            body["excerpt"] = JsonValue::String(excerpt);
        }
        if let Some(url) = self.featured_image {
            body["featuredImage"] = JsonValue::String(url);
        }
        merge(&mut body, self.extra);
        body
    }
}

/// Create a page config payload with a unique page key.
pub fn page_config(title: &str) -> TestPageConfig {
    TestPageConfig {
        page_key: format!("test-page-{}", unique_suffix()),
        title: title.to_string(),
        description: None,
        config: json!({}),
        extra: Map::new(),
    }
}

/// Builder for `POST /api/page-configs` bodies.
#[derive(Debug, Clone)]
pub struct TestPageConfig {
    pub page_key: String,
    pub title: String,
    pub description: Option<String>,
    pub config: JsonValue,
    extra: Map<String, JsonValue>,
}

impl TestPageConfig {
    pub fn with_page_key(mut self, page_key: &str) -> Self {
        self.page_key = page_key.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_config(mut self, config: JsonValue) -> Self {
        self.config = config;
        self
    }

    /// Set an arbitrary extra field, for malformed-input tests.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> JsonValue {
        let mut body = json!({
            "pageKey": self.page_key,
            "title": self.title,
            "config": self.config,
        });
        if let Some(description) = self.description {
            body["description"] = JsonValue::String(description);
        }
        merge(&mut body, self.extra);
        body
    }
}

fn merge(body: &mut JsonValue, extra: Map<String, JsonValue>) {
    if let Some(object) = body.as_object_mut() {
        object.extend(extra);
    }
}

/// Build a `multipart/form-data` body with a single file part and optional
/// plain fields. Returns the content type header value and the body bytes.
pub fn multipart_body(
    file_name: &str,
    file_bytes: &[u8],
    fields: &[(&str, &str)],
) -> (String, Vec<u8>) {
    let boundary = format!("inkstand-{}", unique_suffix());
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}
