//! HTTP route handlers.

pub mod auth;
pub mod blog_post;
pub mod health;
pub mod image;
pub mod page_config;
pub mod text_content;

use axum::Router;
use axum::extract::DefaultBodyLimit;

use crate::content::sanitize_rich_text;
use crate::content::validate::MAX_CONTENT_LENGTH;
use crate::error::{AppError, AppResult};
use crate::middleware::resolve_identity;
use crate::state::AppState;

/// JSON request body cap in bytes. Content is limited in characters, so the
/// cap allows four UTF-8 bytes for each of them plus room for the remaining
/// fields.
pub const MAX_JSON_BODY_SIZE: usize = MAX_CONTENT_LENGTH * 4 + 1024 * 1024;

/// Run [`sanitize_rich_text`] on the blocking pool; content can be megabytes.
pub(crate) async fn sanitize_rich_text_blocking(content: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || sanitize_rich_text(&content))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "rich text sanitization task failed");
            AppError::Internal(anyhow::Error::new(e).context("rich text sanitization failed"))
        })
}

/// Build the application router with every route and the identity layer.
///
/// Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let max_upload_size = state.max_upload_size();

    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(text_content::router())
        .merge(blog_post::router())
        .merge(page_config::router())
        .merge(image::router(max_upload_size))
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_SIZE))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        .with_state(state)
}
