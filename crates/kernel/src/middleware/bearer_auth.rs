//! Bearer token identity middleware.
//!
//! Resolves `Authorization: Bearer <token>` against the identity provider
//! and stores the resulting [`AuthContext`] in request extensions. Requests
//! are never rejected here: a missing or invalid token leaves the request
//! anonymous.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::auth::{AuthContext, derive_auth_context};
use crate::state::AppState;

/// Attach the caller's [`AuthContext`] to the request.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let context: AuthContext = derive_auth_context(state.identity(), request.headers()).await;
    request.extensions_mut().insert(context);

    next.run(request).await
}
