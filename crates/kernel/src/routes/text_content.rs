//! Text content API.
//!
//! Keyed rich-text snippets. Content is sanitized before it is stored.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{AuthContext, RequireAuth};
use crate::content::validate::{
    MAX_CONTENT_LENGTH, MAX_KEY_LENGTH, require_object, validate_content, validate_length,
};
use crate::error::{AppError, AppResult};
use crate::models::{NewTextContent, TextContent, TextContentPatch};
use crate::routes::sanitize_rich_text_blocking;
use crate::state::AppState;

/// Create the text content router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/text-content",
            get(list_text_content).post(create_text_content),
        )
        .route(
            "/api/text-content/{id}",
            get(get_text_content)
                .put(update_text_content)
                .delete(delete_text_content),
        )
        .route("/api/text-content/key/{key}", get(get_text_content_by_key))
}

async fn list_text_content(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Vec<TextContent>>> {
    let records = state.storage_for(&auth).list_text_content().await?;
    Ok(Json(records))
}

async fn get_text_content(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TextContent>> {
    state
        .storage_for(&auth)
        .get_text_content(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn get_text_content_by_key(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(key): Path<String>,
) -> AppResult<Json<TextContent>> {
    state
        .storage_for(&auth)
        .get_text_content_by_key(&key)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn create_text_content(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<TextContent>)> {
    let body = require_object(&body)?;
    let key = validate_length(body.get("key"), MAX_KEY_LENGTH, "Key")?;
    let content = validate_content(body.get("content"), MAX_CONTENT_LENGTH)?;

    let saved = state
        .storage_for(&auth)
        .save_text_content(NewTextContent {
            key,
            content: sanitize_rich_text_blocking(content).await?,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_text_content(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<TextContent>> {
    let body = require_object(&body)?;

    let mut patch = TextContentPatch::default();
    if let Some(key) = body.get("key") {
        patch.key = Some(validate_length(Some(key), MAX_KEY_LENGTH, "Key")?);
    }
    if let Some(content) = body.get("content") {
        let content = validate_content(Some(content), MAX_CONTENT_LENGTH)?;
        patch.content = Some(sanitize_rich_text_blocking(content).await?);
    }

    state
        .storage_for(&auth)
        .update_text_content(id, patch)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_text_content(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.storage_for(&auth).delete_text_content(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
