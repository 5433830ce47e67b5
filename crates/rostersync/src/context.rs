//! Application-wide wiring of the cache.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use rostersync_core::remote::Repository;
use rostersync_core::storage::{Entity, StoreError};

use crate::cached::CachingService;
use crate::config::Config;
use crate::dedup::RequestDeduplicator;
use crate::session::{ReloadState, Session};
use crate::storage::{delete_database, Database, SqliteStore};

/// Errors raised while setting up or tearing down a [`SyncContext`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Failed to create cache directory {path}: {reason}")]
    CacheDir { path: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ContextError>;

/// Shared state of every caching service in the application.
///
/// Owns the database connection, the [`Session`] whose invalidation makes all
/// services reload, and the optional [`RequestDeduplicator`].
pub struct SyncContext {
    database: Database,
    session: Arc<Session>,
    dedup: Option<Arc<RequestDeduplicator>>,
}

impl SyncContext {
    /// Creates the cache directory and opens the configured database.
    pub async fn open(config: &Config) -> Result<Self> {
        create_cache_dir(&config.cache_dir).await?;
        let database = Database::open(&config.cache_dir, config.database_schema()).await?;

        Ok(Self::with_database(database, config.deduplicate_fetches))
    }

    /// Wraps an already opened database.
    pub fn with_database(database: Database, deduplicate_fetches: bool) -> Self {
        Self {
            database,
            session: Session::new(),
            dedup: deduplicate_fetches.then(|| Arc::new(RequestDeduplicator::new())),
        }
    }

    /// Returns a caching service for `T`'s collection backed by `remote`.
    pub fn service<T, R>(&self, remote: Arc<R>) -> Result<CachingService<T, SqliteStore<T>, R>>
    where
        T: Entity,
        R: Repository<T> + 'static,
    {
        let store = Arc::new(self.database.collection_for::<T>()?);
        let service = CachingService::new(
            store,
            remote,
            ReloadState::new(Arc::clone(&self.session)),
        );

        Ok(match &self.dedup {
            Some(dedup) => service.with_deduplicator(Arc::clone(dedup)),
            None => service,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn deduplicator(&self) -> Option<&Arc<RequestDeduplicator>> {
        self.dedup.as_ref()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Makes every service created from this context reload on its next read.
    pub fn invalidate_session(&self) -> u64 {
        self.session.invalidate()
    }

    /// Closes and deletes the database. Services created from this context
    /// fail from now on.
    pub async fn reset(self) -> Result<()> {
        let name = self.database.name().to_string();
        self.database.delete().await?;
        tracing::info!(database = %name, "Cache reset");
        Ok(())
    }
}

/// Deletes the configured database without opening it.
pub async fn reset_cache(config: &Config) -> Result<()> {
    delete_database(&config.cache_dir, &config.db_name).await?;
    tracing::info!(database = %config.db_name, "Cache reset");
    Ok(())
}

async fn create_cache_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ContextError::CacheDir {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}
