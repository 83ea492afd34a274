//! Per-request backend selection.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::debug;

use super::{CmsStorage, DatabaseRoles, DbCredential, MemoryStorage, PgStorage};

#[derive(Clone)]
struct Durable {
    pool: PgPool,
    roles: Arc<DatabaseRoles>,
    timeout: Duration,
}

/// Chooses the storage backend for each request.
///
/// With a database configured every request gets a [`PgStorage`] scoped to
/// the request's credential. Without one, all requests share a single
/// process-wide [`MemoryStorage`].
#[derive(Clone)]
pub struct BackendSelector {
    durable: Option<Durable>,
    memory: Arc<MemoryStorage>,
}

impl BackendSelector {
    /// Selector that always serves the shared in-memory store.
    pub fn memory() -> Self {
        Self {
            durable: None,
            memory: Arc::new(MemoryStorage::new()),
        }
    }

    /// Selector backed by PostgreSQL.
    pub fn durable(pool: PgPool, roles: DatabaseRoles, timeout: Duration) -> Self {
        Self {
            durable: Some(Durable {
                pool,
                roles: Arc::new(roles),
                timeout,
            }),
            memory: Arc::new(MemoryStorage::new()),
        }
    }

    /// Whether a durable backend is configured.
    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Connection pool of the durable backend, if any.
    pub fn pool(&self) -> Option<&PgPool> {
        self.durable.as_ref().map(|durable| &durable.pool)
    }

    /// Storage for a request carrying `credential`.
    pub fn select(&self, credential: &DbCredential) -> Arc<dyn CmsStorage> {
        let storage: Arc<dyn CmsStorage> = match &self.durable {
            Some(durable) => Arc::new(PgStorage::new(
                durable.pool.clone(),
                credential.clone(),
                durable.roles.clone(),
                durable.timeout,
            )),
            None => self.memory.clone(),
        };

        debug!(
            backend = storage.backend().as_str(),
            scoped = credential.is_user(),
            "selected storage backend"
        );
        storage
    }
}
