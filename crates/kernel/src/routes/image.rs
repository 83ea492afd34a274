//! Image upload routes.
//!
//! - `POST /api/images/compress`: multipart `file` + `width`, responds with JPEG bytes
//! - `POST /api/images`: multipart `file`, stores the image
//! - `GET /api/images`: lists stored images, newest first

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::auth::RequireAuth;
use crate::error::{AppError, AppResult};
use crate::file::StoredImage;
use crate::state::AppState;

/// Width used when a compress request does not name one.
pub const DEFAULT_WIDTH: u32 = 1200;

/// Allowance for multipart framing on top of the upload size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the image router. Request bodies are capped at `max_upload_size`
/// plus multipart framing.
pub fn router(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/api/images/compress", post(compress_image))
        .route("/api/images", get(list_images).post(upload_image))
        .layer(DefaultBodyLimit::max(
            max_upload_size.saturating_add(MULTIPART_OVERHEAD),
        ))
}

/// Parsed multipart upload.
struct Upload {
    file_name: String,
    data: Bytes,
    width: Option<u32>,
}

async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    let mut file: Option<(String, Bytes)> = None;
    let mut width = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read file: {e}")))?;
                file = Some((file_name, data));
            }
            "width" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read width: {e}")))?;
                let parsed = text
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|w| *w > 0)
                    .ok_or_else(|| {
                        AppError::BadRequest("width must be a positive integer".to_string())
                    })?;
                width = Some(parsed);
            }
            _ => {}
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::BadRequest("missing file field".to_string()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("file is empty".to_string()));
    }

    Ok(Upload {
        file_name,
        data,
        width,
    })
}

async fn compress_image(
    State(state): State<AppState>,
    RequireAuth(_auth): RequireAuth,
    multipart: Multipart,
) -> AppResult<Response> {
    let upload = read_upload(multipart).await?;
    let width = upload.width.unwrap_or(DEFAULT_WIDTH);

    let output = state.images().compress(upload.data.to_vec(), width).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/jpeg")],
        output,
    )
        .into_response())
}

async fn upload_image(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<StoredImage>)> {
    let upload = read_upload(multipart).await?;

    let stored = state
        .image_store()
        .store(&upload.file_name, &upload.data)
        .await?;

    info!(
        name = %stored.name,
        size = stored.size,
        user_id = auth.author_id(),
        "image uploaded"
    );
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn list_images(State(state): State<AppState>) -> AppResult<Json<Vec<StoredImage>>> {
    Ok(Json(state.image_store().list().await?))
}
