//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::auth::IdentityError;
use crate::content::ValidationError;
use crate::file::ImageError;
use crate::storage::StorageError;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { .. } => AppError::Conflict(err.to_string()),
            StorageError::Timeout(_) => {
                tracing::warn!(error = %err, "storage timeout");
                AppError::Unavailable("storage temporarily unavailable".to_string())
            }
            StorageError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken | IdentityError::InvalidCredentials => {
                AppError::Unauthorized
            }
            other => {
                tracing::warn!(error = %other, "identity provider failure");
                AppError::Unavailable("identity provider unavailable".to_string())
            }
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            ImageError::UnsupportedType(_) | ImageError::Decode(_) => {
                AppError::BadRequest(err.to_string())
            }
            ImageError::Io(e) => {
                AppError::Internal(anyhow::Error::new(e).context("image storage failed"))
            }
            ImageError::Unavailable => AppError::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details are logged, never returned.
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn storage_errors_map_to_statuses() {
        let conflict = AppError::from(StorageError::Conflict {
            entity: "Blog post",
            field: "slug",
        });
        assert_eq!(conflict.to_string(), "Blog post with this slug already exists");
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let timeout = AppError::from(StorageError::Timeout(Duration::from_secs(1)));
        assert_eq!(
            timeout.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn identity_errors_map_to_statuses() {
        assert_eq!(
            AppError::from(IdentityError::InvalidCredentials)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(IdentityError::UnexpectedStatus(StatusCode::BAD_GATEWAY))
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn image_errors_map_to_statuses() {
        let too_large = AppError::from(ImageError::TooLarge { size: 20, max: 10 });
        assert_eq!(
            too_large.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::from(ImageError::UnsupportedType("text/plain".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn validation_error_is_bad_request() {
        let err = AppError::from(ValidationError::Empty {
            field: "Key".to_string(),
        });
        assert_eq!(err.to_string(), "Key cannot be empty");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
