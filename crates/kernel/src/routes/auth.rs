//! Authentication routes (login, refresh, current user).
//!
//! Sessions are issued by the identity provider; this service only relays
//! tokens and never stores credentials.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::auth::{AuthUser, IdentityProvider, IssuedSession, RequireAuth, SessionTokens};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Create the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me", get(me))
}

fn provider(state: &AppState) -> AppResult<&dyn IdentityProvider> {
    state
        .identity()
        .ok_or_else(|| AppError::Unavailable("identity provider not configured".to_string()))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<IssuedSession>> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    let session = provider(&state)?
        .issue_session(email, &request.password)
        .await?;

    info!(user_id = %session.user_id, "user logged in");
    Ok(Json(session))
}

async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<SessionTokens>> {
    if request.refresh_token.trim().is_empty() {
        return Err(AppError::BadRequest("refreshToken is required".to_string()));
    }

    let tokens = provider(&state)?
        .refresh_session(request.refresh_token.trim())
        .await?;
    Ok(Json(tokens))
}

async fn me(RequireAuth(auth): RequireAuth) -> AppResult<Json<AuthUser>> {
    auth.user.map(Json).ok_or(AppError::Unauthorized)
}
