//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::auth::{AuthContext, HttpIdentityProvider, IdentityProvider};
use crate::config::Config;
use crate::db;
use crate::file::{ImageProcessor, LocalImageStore};
use crate::storage::{BackendSelector, CmsStorage, DatabaseRoles};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Per-request storage backend selection.
    storage: BackendSelector,

    /// Identity provider. `None` when no provider is configured.
    identity: Option<Arc<dyn IdentityProvider>>,

    /// JPEG compression with bounded concurrency.
    images: ImageProcessor,

    /// Uploaded image storage.
    image_store: LocalImageStore,

    /// Maximum accepted image upload in bytes.
    max_upload_size: usize,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// A configured database must be reachable; there is no fallback to the
    /// in-memory backend once `DATABASE_URL` is set.
    pub async fn new(config: &Config) -> Result<Self> {
        let storage = match &config.database {
            Some(database) => {
                let pool = db::create_pool(database).await?;
                info!(
                    max_connections = database.max_connections,
                    "connected to PostgreSQL"
                );

                if database.run_migrations {
                    db::run_migrations(&pool)
                        .await
                        .context("failed to run migrations")?;
                    info!("migrations applied");
                }

                BackendSelector::durable(
                    pool,
                    DatabaseRoles {
                        anonymous: database.anon_role.clone(),
                        authenticated: database.authenticated_role.clone(),
                    },
                    database.timeout,
                )
            }
            None => {
                info!("DATABASE_URL not set; using in-memory storage");
                BackendSelector::memory()
            }
        };

        let identity: Option<Arc<dyn IdentityProvider>> = match &config.auth {
            Some(auth) => {
                let provider = HttpIdentityProvider::new(auth)?;
                info!(
                    url = %auth.url,
                    local_verification = auth.jwt_secret.is_some(),
                    "identity provider configured"
                );
                Some(Arc::new(provider))
            }
            None => {
                info!("AUTH_URL not set; all requests are anonymous");
                None
            }
        };

        Ok(Self::from_parts(config, storage, identity))
    }

    /// Assemble state from already-built components.
    pub fn from_parts(
        config: &Config,
        storage: BackendSelector,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                storage,
                identity,
                images: ImageProcessor::new(config.max_upload_size),
                image_store: LocalImageStore::new(
                    &config.uploads_dir,
                    &config.files_url,
                    config.max_upload_size,
                ),
                max_upload_size: config.max_upload_size,
            }),
        }
    }

    /// Storage for a request made under `auth`.
    pub fn storage_for(&self, auth: &AuthContext) -> Arc<dyn CmsStorage> {
        self.inner.storage.select(&auth.credential)
    }

    /// Get the backend selector.
    pub fn storage(&self) -> &BackendSelector {
        &self.inner.storage
    }

    /// Get the identity provider, if configured.
    pub fn identity(&self) -> Option<&dyn IdentityProvider> {
        self.inner.identity.as_deref()
    }

    /// Get the image processor.
    pub fn images(&self) -> &ImageProcessor {
        &self.inner.images
    }

    /// Get the image store.
    pub fn image_store(&self) -> &LocalImageStore {
        &self.inner.image_store
    }

    /// Maximum accepted image upload in bytes.
    pub fn max_upload_size(&self) -> usize {
        self.inner.max_upload_size
    }

    /// Get the database pool, when a durable backend is configured.
    pub fn db(&self) -> Option<&PgPool> {
        self.inner.storage.pool()
    }

    /// Check PostgreSQL health. `None` when no database is configured.
    pub async fn postgres_healthy(&self) -> Option<bool> {
        match self.db() {
            Some(pool) => Some(db::check_health(pool).await),
            None => None,
        }
    }
}
