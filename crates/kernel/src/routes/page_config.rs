//! Page configuration API.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{AuthContext, RequireAuth};
use crate::content::sanitize_plain_text;
use crate::content::validate::{
    MAX_KEY_LENGTH, MAX_SUMMARY_LENGTH, MAX_TITLE_LENGTH, require_object, validate_config,
    validate_length, validate_optional_length,
};
use crate::error::{AppError, AppResult};
use crate::models::{NewPageConfig, PageConfig, PageConfigPatch};
use crate::state::AppState;

/// Create the page configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/page-configs",
            get(list_page_configs).post(create_page_config),
        )
        .route(
            "/api/page-configs/{id}",
            get(get_page_config)
                .put(update_page_config)
                .delete(delete_page_config),
        )
        .route(
            "/api/page-configs/key/{page_key}",
            get(get_page_config_by_key),
        )
}

async fn list_page_configs(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AppResult<Json<Vec<PageConfig>>> {
    let configs = state.storage_for(&auth).list_page_configs().await?;
    Ok(Json(configs))
}

async fn get_page_config(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PageConfig>> {
    state
        .storage_for(&auth)
        .get_page_config(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn get_page_config_by_key(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(page_key): Path<String>,
) -> AppResult<Json<PageConfig>> {
    state
        .storage_for(&auth)
        .get_page_config_by_key(&page_key)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn create_page_config(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<PageConfig>)> {
    let body = require_object(&body)?;

    let input = NewPageConfig {
        page_key: validate_length(body.get("pageKey"), MAX_KEY_LENGTH, "Page key")?,
        title: sanitize_plain_text(&validate_length(
            body.get("title"),
            MAX_TITLE_LENGTH,
            "Title",
        )?),
        description: validate_optional_length(
            body.get("description"),
            MAX_SUMMARY_LENGTH,
            "Description",
        )?
        .map(|d| sanitize_plain_text(&d)),
        config: validate_config(body.get("config"))?,
    };

    let saved = state.storage_for(&auth).save_page_config(input).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_page_config(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<PageConfig>> {
    let body = require_object(&body)?;

    let mut patch = PageConfigPatch {
        description: validate_optional_length(
            body.get("description"),
            MAX_SUMMARY_LENGTH,
            "Description",
        )?
        .map(|d| sanitize_plain_text(&d)),
        ..Default::default()
    };
    if let Some(value) = body.get("pageKey") {
        patch.page_key = Some(validate_length(Some(value), MAX_KEY_LENGTH, "Page key")?);
    }
    if let Some(value) = body.get("title") {
        patch.title = Some(sanitize_plain_text(&validate_length(
            Some(value),
            MAX_TITLE_LENGTH,
            "Title",
        )?));
    }
    if let Some(value) = body.get("config") {
        patch.config = Some(validate_config(Some(value))?);
    }

    state
        .storage_for(&auth)
        .update_page_config(id, patch)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_page_config(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if state.storage_for(&auth).delete_page_config(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
