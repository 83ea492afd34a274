#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] wires the real router and application state. Storage is the
//! in-memory backend unless a test builds a durable selector itself, and the
//! identity provider is [`FakeProvider`], which accepts a fixed set of tokens.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Map, Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use inkstand_kernel::auth::{
    IdentityError, IdentityProvider, IssuedSession, SessionTokens, VerifiedUser,
};
use inkstand_kernel::storage::BackendSelector;
use inkstand_kernel::{AppState, Config, routes};

/// Token the fake provider accepts for the editor account.
pub const EDITOR_TOKEN: &str = "editor-access-token";

/// Token that makes the fake provider report an outage.
pub const OUTAGE_TOKEN: &str = "provider-outage";

pub const EDITOR_ID: &str = "0b8e6c1e-3f0a-4d7c-9a55-6f4f3cb1d001";
pub const EDITOR_EMAIL: &str = "editor@example.com";
pub const EDITOR_PASSWORD: &str = "correct horse battery staple";
pub const REFRESH_TOKEN: &str = "editor-refresh-token";

/// Identity provider with one known user.
pub struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn verify_token(&self, token: &str) -> Result<VerifiedUser, IdentityError> {
        match token {
            EDITOR_TOKEN => {
                let mut metadata = Map::new();
                metadata.insert("role".to_string(), json!("editor"));
                Ok(VerifiedUser {
                    id: EDITOR_ID.to_string(),
                    email: Some(EDITOR_EMAIL.to_string()),
                    metadata,
                })
            }
            OUTAGE_TOKEN => Err(IdentityError::MalformedResponse(
                "provider unavailable".to_string(),
            )),
            _ => Err(IdentityError::InvalidToken),
        }
    }

    async fn issue_session(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IssuedSession, IdentityError> {
        if email != EDITOR_EMAIL || password != EDITOR_PASSWORD {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(IssuedSession {
            access_token: EDITOR_TOKEN.to_string(),
            refresh_token: REFRESH_TOKEN.to_string(),
            user_id: EDITOR_ID.to_string(),
            email: Some(EDITOR_EMAIL.to_string()),
            metadata: Map::new(),
        })
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, IdentityError> {
        if refresh_token != REFRESH_TOKEN {
            return Err(IdentityError::InvalidToken);
        }
        Ok(SessionTokens {
            access_token: EDITOR_TOKEN.to_string(),
            refresh_token: REFRESH_TOKEN.to_string(),
        })
    }
}

/// Test application wrapper using the real kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub uploads_dir: PathBuf,
}

impl TestApp {
    /// In-memory storage with the fake identity provider.
    pub fn new() -> Self {
        Self::with_storage(BackendSelector::memory(), true)
    }

    /// In-memory storage and no identity provider at all.
    pub fn without_identity() -> Self {
        Self::with_storage(BackendSelector::memory(), false)
    }

    pub fn with_storage(storage: BackendSelector, identity: bool) -> Self {
        let uploads_dir =
            std::env::temp_dir().join(format!("inkstand-test-uploads-{}", Uuid::now_v7()));
        let config = Config {
            uploads_dir: uploads_dir.clone(),
            files_url: "/files".to_string(),
            max_upload_size: 2 * 1024 * 1024,
            ..Config::default()
        };

        let provider: Option<Arc<dyn IdentityProvider>> = if identity {
            Some(Arc::new(FakeProvider))
        } else {
            None
        };

        let state = AppState::from_parts(&config, storage, provider);
        let router = routes::router(state.clone());

        Self {
            router,
            state,
            uploads_dir,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> Response {
        self.request(
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Send a JSON body with `method`, optionally as the holder of `token`.
    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// POST as the editor.
    pub async fn post_json(&self, uri: &str, body: &Value) -> Response {
        self.send_json("POST", uri, Some(EDITOR_TOKEN), body).await
    }

    /// PUT as the editor.
    pub async fn put_json(&self, uri: &str, body: &Value) -> Response {
        self.send_json("PUT", uri, Some(EDITOR_TOKEN), body).await
    }

    /// DELETE as the editor.
    pub async fn delete(&self, uri: &str) -> Response {
        self.request(
            Request::delete(uri)
                .header(header::AUTHORIZATION, format!("Bearer {EDITOR_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST a multipart body, optionally as the holder of `token`.
    pub async fn post_multipart(
        &self,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body: Vec<u8>,
    ) -> Response {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.request(builder.body(Body::from(body)).unwrap()).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads_dir);
    }
}

/// Collect a response body into bytes.
pub async fn response_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Parse a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    serde_json::from_slice(&response_bytes(response).await).expect("response is not JSON")
}

/// Encode a small PNG test image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
