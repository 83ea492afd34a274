//! Blog post API.
//!
//! Titles, excerpts and tags are stored as plain text; content is sanitized
//! rich text. The author is the authenticated caller.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::{AuthContext, RequireAuth};
use crate::content::validate::{
    MAX_CONTENT_LENGTH, MAX_KEY_LENGTH, MAX_SUMMARY_LENGTH, MAX_TITLE_LENGTH, MAX_URL_LENGTH,
    require_object, validate_content, validate_flag, validate_length, validate_optional_length,
    validate_tags,
};
use crate::content::{ValidationError, is_allowed_url, sanitize_plain_text};
use crate::error::{AppError, AppResult};
use crate::models::{BlogPost, BlogPostFilter, BlogPostPatch, NewBlogPost};
use crate::routes::sanitize_rich_text_blocking;
use crate::state::AppState;

/// Create the blog post router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/blog-posts", get(list_blog_posts).post(create_blog_post))
        .route(
            "/api/blog-posts/{id}",
            get(get_blog_post)
                .put(update_blog_post)
                .delete(delete_blog_post),
        )
        .route("/api/blog-posts/slug/{slug}", get(get_blog_post_by_slug))
}

fn title(value: &Value) -> Result<String, ValidationError> {
    validate_length(Some(value), MAX_TITLE_LENGTH, "Title").map(|t| sanitize_plain_text(&t))
}

fn excerpt(body: &Map<String, Value>) -> Result<Option<String>, ValidationError> {
    Ok(
        validate_optional_length(body.get("excerpt"), MAX_SUMMARY_LENGTH, "Excerpt")?
            .map(|e| sanitize_plain_text(&e)),
    )
}

fn tags(body: &Map<String, Value>) -> Result<Option<Vec<String>>, ValidationError> {
    Ok(validate_tags(body.get("tags"))?
        .map(|tags| tags.into_iter().map(|tag| sanitize_plain_text(&tag)).collect()))
}

/// Featured image reference: a URL with an allowed scheme and no markup
/// characters, stored entity-escaped like other plain-text fields.
fn featured_image(body: &Map<String, Value>) -> Result<Option<String>, ValidationError> {
    let Some(url) =
        validate_optional_length(body.get("featuredImage"), MAX_URL_LENGTH, "Featured image")?
    else {
        return Ok(None);
    };

    let has_markup = url
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\''));
    if url.is_empty() || has_markup || !is_allowed_url(&url) {
        return Err(ValidationError::InvalidShape {
            field: "Featured image".to_string(),
            expected: "a safe URL",
        });
    }
    Ok(Some(sanitize_plain_text(&url)))
}

async fn list_blog_posts(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<BlogPostFilter>,
) -> AppResult<Json<Vec<BlogPost>>> {
    let posts = state.storage_for(&auth).list_blog_posts(filter).await?;
    Ok(Json(posts))
}

async fn get_blog_post(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BlogPost>> {
    state
        .storage_for(&auth)
        .get_blog_post(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn get_blog_post_by_slug(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(slug): Path<String>,
) -> AppResult<Json<BlogPost>> {
    state
        .storage_for(&auth)
        .get_blog_post_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn create_blog_post(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<BlogPost>)> {
    let body = require_object(&body)?;

    let input = NewBlogPost {
        title: title(body.get("title").unwrap_or(&Value::Null))?,
        slug: validate_length(body.get("slug"), MAX_KEY_LENGTH, "Slug")?,
        content: sanitize_rich_text_blocking(validate_content(
            body.get("content"),
            MAX_CONTENT_LENGTH,
        )?)
        .await?,
        excerpt: excerpt(body)?,
        author_id: auth.author_id().to_string(),
        published: validate_flag(body.get("published"), "Published")?.unwrap_or(false),
        tags: tags(body)?,
        featured_image: featured_image(body)?,
    };

    let saved = state.storage_for(&auth).save_blog_post(input).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_blog_post(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<BlogPost>> {
    let body = require_object(&body)?;

    let mut patch = BlogPostPatch {
        excerpt: excerpt(body)?,
        published: validate_flag(body.get("published"), "Published")?,
        tags: tags(body)?,
        featured_image: featured_image(body)?,
        ..Default::default()
    };
    if let Some(value) = body.get("title") {
        patch.title = Some(title(value)?);
    }
    if let Some(value) = body.get("slug") {
        patch.slug = Some(validate_length(Some(value), MAX_KEY_LENGTH, "Slug")?);
    }
    if let Some(value) = body.get("content") {
        let content = validate_content(Some(value), MAX_CONTENT_LENGTH)?;
        patch.content = Some(sanitize_rich_text_blocking(content).await?);
    }

    state
        .storage_for(&auth)
        .update_blog_post(id, patch)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_blog_post(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.storage_for(&auth).delete_blog_post(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn featured_image_accepts_safe_urls() {
        for url in ["https://cdn.example.com/a.jpg", "/files/a.jpg", "a.jpg"] {
            let body = object(json!({ "featuredImage": url }));
            assert_eq!(featured_image(&body).unwrap().as_deref(), Some(url));
        }
        let body = object(json!({ "featuredImage": "https://x.test/a.jpg?w=1&h=2" }));
        assert_eq!(
            featured_image(&body).unwrap().as_deref(),
            Some("https://x.test/a.jpg?w=1&amp;h=2")
        );
        assert_eq!(featured_image(&object(json!({}))).unwrap(), None);
        assert_eq!(
            featured_image(&object(json!({ "featuredImage": null }))).unwrap(),
            None
        );
    }

    #[test]
    fn featured_image_rejects_unsafe_urls() {
        for url in [
            "javascript:alert(1)",
            "https://x.test/\"onerror=\"alert(1)",
            "https://x.test/a b.jpg",
            "",
        ] {
            let body = object(json!({ "featuredImage": url }));
            assert!(featured_image(&body).is_err(), "accepted {url:?}");
        }
    }

    #[test]
    fn titles_and_tags_become_plain_text() {
        assert_eq!(title(&json!("<b>Hello</b>")).unwrap(), "Hello");
        let body = object(json!({ "tags": ["<i>rust</i>", "web"] }));
        assert_eq!(
            tags(&body).unwrap(),
            Some(vec!["rust".to_string(), "web".to_string()])
        );
    }

    #[test]
    fn title_is_required() {
        assert!(matches!(
            title(&Value::Null),
            Err(ValidationError::NotAString { .. })
        ));
        assert!(matches!(
            title(&json!("")),
            Err(ValidationError::Empty { .. })
        ));
    }
}
