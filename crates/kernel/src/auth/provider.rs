//! Identity provider client.
//!
//! Talks to a GoTrue-compatible auth service: bearer tokens are checked
//! against `/auth/v1/user`, sessions are issued and refreshed through
//! `/auth/v1/token`. When the provider's JWT secret is configured, access
//! tokens are verified locally (HS256) without a network round trip.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::AuthConfig;

/// Identity provider failures.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("identity provider returned status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("malformed identity provider response: {0}")]
    MalformedResponse(String),

    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A user confirmed by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedUser {
    pub id: String,
    pub email: Option<String>,
    /// Provider metadata, with app metadata taking precedence over user metadata.
    pub metadata: Map<String, Value>,
}

/// Access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a password sign-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub email: Option<String>,
    pub metadata: Map<String, Value>,
}

/// External identity provider operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an access token and return the user it belongs to.
    async fn verify_token(&self, token: &str) -> Result<VerifiedUser, IdentityError>;

    /// Sign in with email and password.
    async fn issue_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IssuedSession, IdentityError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, IdentityError>;
}

/// User object as returned by the provider.
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: Option<String>,
    user_metadata: Option<Map<String, Value>>,
    app_metadata: Option<Map<String, Value>>,
}

impl From<ProviderUser> for VerifiedUser {
    fn from(user: ProviderUser) -> Self {
        VerifiedUser {
            id: user.id,
            email: user.email.filter(|email| !email.is_empty()),
            metadata: merge_metadata(user.user_metadata, user.app_metadata),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    user: ProviderUser,
}

/// Claims read when verifying access tokens locally.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    email: Option<String>,
    user_metadata: Option<Map<String, Value>>,
    app_metadata: Option<Map<String, Value>>,
}

fn merge_metadata(
    user: Option<Map<String, Value>>,
    app: Option<Map<String, Value>>,
) -> Map<String, Value> {
    let mut merged = user.unwrap_or_default();
    merged.extend(app.unwrap_or_default());
    merged
}

/// HTTP client for a GoTrue-compatible identity provider.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    api_key: String,
    user_endpoint: Url,
    password_grant: Url,
    refresh_grant: Url,
    decoding_key: Option<DecodingKey>,
}

impl HttpIdentityProvider {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()
            .context("failed to build identity provider HTTP client")?;

        let user_endpoint = config
            .url
            .join("auth/v1/user")
            .context("invalid identity provider URL")?;
        let token_endpoint = config
            .url
            .join("auth/v1/token")
            .context("invalid identity provider URL")?;

        let mut password_grant = token_endpoint.clone();
        password_grant
            .query_pairs_mut()
            .append_pair("grant_type", "password");
        let mut refresh_grant = token_endpoint;
        refresh_grant
            .query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            user_endpoint,
            password_grant,
            refresh_grant,
            decoding_key: config
                .jwt_secret
                .as_deref()
                .map(|secret| DecodingKey::from_secret(secret.as_bytes())),
        })
    }

    /// Verify an HS256 access token with the shared secret.
    fn verify_locally(
        &self,
        key: &DecodingKey,
        token: &str,
    ) -> Result<VerifiedUser, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<AccessClaims>(token, key, &validation).map_err(|e| {
            debug!(error = %e, "local token verification failed");
            IdentityError::InvalidToken
        })?;

        let claims = data.claims;
        Ok(VerifiedUser {
            id: claims.sub,
            email: claims.email.filter(|email| !email.is_empty()),
            metadata: merge_metadata(claims.user_metadata, claims.app_metadata),
        })
    }

    async fn request_tokens(
        &self,
        endpoint: &Url,
        body: Value,
        rejected: IdentityError,
    ) -> Result<TokenResponse, IdentityError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        read_json(response, rejected).await
    }
}

/// Decode a provider response, mapping client-error statuses to `rejected`.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    rejected: IdentityError,
) -> Result<T, IdentityError> {
    let status = response.status();
    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    ) {
        return Err(rejected);
    }
    if !status.is_success() {
        return Err(IdentityError::UnexpectedStatus(status));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| IdentityError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedUser, IdentityError> {
        if let Some(key) = &self.decoding_key {
            return self.verify_locally(key, token);
        }

        let response = self
            .client
            .get(self.user_endpoint.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        let user: ProviderUser = read_json(response, IdentityError::InvalidToken).await?;
        Ok(user.into())
    }

    async fn issue_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IssuedSession, IdentityError> {
        let tokens = self
            .request_tokens(
                &self.password_grant,
                serde_json::json!({ "email": email, "password": password }),
                IdentityError::InvalidCredentials,
            )
            .await?;

        let user = VerifiedUser::from(tokens.user);
        debug!(user_id = %user.id, "issued session");

        Ok(IssuedSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id: user.id,
            email: user.email,
            metadata: user.metadata,
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, IdentityError> {
        let tokens = self
            .request_tokens(
                &self.refresh_grant,
                serde_json::json!({ "refresh_token": refresh_token }),
                IdentityError::InvalidToken,
            )
            .await?;

        Ok(SessionTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret-with-enough-length";

    fn provider(jwt_secret: Option<&str>) -> HttpIdentityProvider {
        HttpIdentityProvider::new(&AuthConfig {
            url: Url::parse("http://127.0.0.1:9/").unwrap(),
            api_key: "anon-key".to_string(),
            jwt_secret: jwt_secret.map(str::to_string),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    fn sign(claims: &Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn endpoints_are_built_from_base_url() {
        let provider = provider(None);
        assert_eq!(
            provider.user_endpoint.as_str(),
            "http://127.0.0.1:9/auth/v1/user"
        );
        assert_eq!(
            provider.password_grant.as_str(),
            "http://127.0.0.1:9/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            provider.refresh_grant.as_str(),
            "http://127.0.0.1:9/auth/v1/token?grant_type=refresh_token"
        );
    }

    #[tokio::test]
    async fn verifies_signed_token_locally() {
        let token = sign(&serde_json::json!({
            "sub": "user-1",
            "email": "editor@example.com",
            "exp": future_exp(),
            "aud": "authenticated",
            "user_metadata": { "name": "Ed", "role": "writer" },
            "app_metadata": { "role": "admin" },
        }));

        let user = provider(Some(SECRET)).verify_token(&token).await.unwrap();
        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("editor@example.com"));
        assert_eq!(user.metadata["name"], "Ed");
        assert_eq!(user.metadata["role"], "admin");
    }

    #[tokio::test]
    async fn rejects_token_signed_with_other_secret() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "sub": "user-1", "exp": future_exp() }),
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();

        let result = provider(Some(SECRET)).verify_token(&token).await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let token = sign(&serde_json::json!({
            "sub": "user-1",
            "exp": chrono::Utc::now().timestamp() - 3600,
        }));

        let result = provider(Some(SECRET)).verify_token(&token).await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let result = provider(Some(SECRET)).verify_token("not.a.jwt").await;
        assert!(matches!(result, Err(IdentityError::InvalidToken)));
    }

    #[test]
    fn empty_email_becomes_none() {
        let user = VerifiedUser::from(ProviderUser {
            id: "u".to_string(),
            email: Some(String::new()),
            user_metadata: None,
            app_metadata: None,
        });
        assert_eq!(user.email, None);
        assert!(user.metadata.is_empty());
    }

    #[test]
    fn issued_session_serializes_camel_case() {
        let session = IssuedSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            user_id: "u".to_string(),
            email: None,
            metadata: Map::new(),
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
        assert_eq!(json["userId"], "u");
    }
}
