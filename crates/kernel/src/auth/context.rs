//! Per-request identity.
//!
//! Every request carries an [`AuthContext`]: anonymous unless a bearer token
//! was presented and verified. Verification failures never reject a request
//! here; routes that need a user use the [`RequireAuth`] extractor.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::provider::{IdentityProvider, VerifiedUser};
use crate::error::AppError;
use crate::models::UNKNOWN_AUTHOR;
use crate::state::AppState;
use crate::storage::DbCredential;

const BEARER_PREFIX: &str = "bearer ";

/// Verified caller identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub metadata: Map<String, Value>,
}

impl From<VerifiedUser> for AuthUser {
    fn from(user: VerifiedUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            metadata: user.metadata,
        }
    }
}

/// Identity and storage credential for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    pub user: Option<AuthUser>,
    pub credential: DbCredential,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for a verified user, with a storage credential carrying the
    /// claims row-level security policies see.
    pub fn authenticated(user: AuthUser, access_token: &str) -> Self {
        let claims = serde_json::json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "aud": "authenticated",
        });

        Self {
            credential: DbCredential::User {
                access_token: access_token.to_string(),
                claims,
            },
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Author id recorded on content created in this context.
    pub fn author_id(&self) -> &str {
        self.user
            .as_ref()
            .map_or(UNKNOWN_AUTHOR, |user| user.id.as_str())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// ignored. Other schemes and empty tokens yield `None`.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let scheme = value.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let token = value[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

/// Derive the request's identity from its headers.
///
/// Missing, malformed, or rejected tokens all produce an anonymous context.
/// A provider outage is treated the same way and logged at `warn`.
pub async fn derive_auth_context(
    provider: Option<&dyn IdentityProvider>,
    headers: &HeaderMap,
) -> AuthContext {
    let Some(token) = extract_bearer_token(headers) else {
        return AuthContext::anonymous();
    };

    let Some(provider) = provider else {
        debug!("bearer token presented but no identity provider is configured");
        return AuthContext::anonymous();
    };

    match provider.verify_token(token).await {
        Ok(user) => {
            debug!(user_id = %user.id, "bearer token verified");
            AuthContext::authenticated(user.into(), token)
        }
        Err(super::IdentityError::InvalidToken) => {
            debug!("bearer token rejected");
            AuthContext::anonymous()
        }
        Err(e) => {
            tracing::warn!(error = %e, "identity provider unavailable; treating request as anonymous");
            AuthContext::anonymous()
        }
    }
}

/// Resolved identity, anonymous when the identity middleware did not run.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Extractor that rejects anonymous callers with 401.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<AuthContext>()
            && context.is_authenticated()
        {
            return Ok(RequireAuth(context.clone()));
        }

        // Upstream context is missing or anonymous; verify the header here.
        let context = derive_auth_context(state.identity(), &parts.headers).await;
        if context.is_authenticated() {
            Ok(RequireAuth(context))
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{IdentityError, IssuedSession, SessionTokens};
    use async_trait::async_trait;
    use axum::http::HeaderValue;

    struct StaticProvider;

    #[async_trait]
    impl IdentityProvider for StaticProvider {
        async fn verify_token(&self, token: &str) -> Result<VerifiedUser, IdentityError> {
            match token {
                "good" => Ok(VerifiedUser {
                    id: "user-1".to_string(),
                    email: Some("a@example.com".to_string()),
                    metadata: Map::new(),
                }),
                "down" => Err(IdentityError::UnexpectedStatus(
                    reqwest::StatusCode::BAD_GATEWAY,
                )),
                _ => Err(IdentityError::InvalidToken),
            }
        }

        async fn issue_session(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<IssuedSession, IdentityError> {
            Err(IdentityError::InvalidCredentials)
        }

        async fn refresh_session(&self, _token: &str) -> Result<SessionTokens, IdentityError> {
            Err(IdentityError::InvalidToken)
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("BEARER   abc  ")), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("  Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer_token(&headers("Bearer ")), None);
        assert_eq!(extract_bearer_token(&headers("Bearer")), None);
        assert_eq!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn anonymous_without_token() {
        let context = derive_auth_context(Some(&StaticProvider), &HeaderMap::new()).await;
        assert_eq!(context, AuthContext::anonymous());
        assert_eq!(context.author_id(), UNKNOWN_AUTHOR);
    }

    #[tokio::test]
    async fn anonymous_without_provider() {
        let context = derive_auth_context(None, &headers("Bearer good")).await;
        assert!(!context.is_authenticated());
    }

    #[tokio::test]
    async fn verified_token_yields_scoped_credential() {
        let context = derive_auth_context(Some(&StaticProvider), &headers("Bearer good")).await;

        let user = context.user.as_ref().unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(context.author_id(), "user-1");
        match &context.credential {
            DbCredential::User {
                access_token,
                claims,
            } => {
                assert_eq!(access_token, "good");
                assert_eq!(claims["sub"], "user-1");
                assert_eq!(claims["role"], "authenticated");
            }
            DbCredential::Anonymous => panic!("expected user credential"),
        }
    }

    #[tokio::test]
    async fn rejected_or_failed_verification_is_anonymous() {
        for value in ["Bearer bad", "Bearer down"] {
            let context = derive_auth_context(Some(&StaticProvider), &headers(value)).await;
            assert_eq!(context, AuthContext::anonymous());
        }
    }
}
