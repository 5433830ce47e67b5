//! Fetch-once-per-session caching service.

use std::marker::PhantomData;
use std::sync::Arc;

use rostersync_core::remote::{self, Repository};
use rostersync_core::storage::{Entity, Store};

use super::{Result, SyncError};
use crate::dedup::RequestDeduplicator;
use crate::session::ReloadState;

/// Deduplicator name used for `T`'s full fetch.
pub fn fetch_all_operation<T: Entity>() -> String {
    format!("{}:fetch_all", T::COLLECTION)
}

/// Read-through cache for one entity type.
///
/// The first read in a session replaces the cache with a full remote fetch;
/// afterwards reads never touch the network until the [`ReloadState`] goes
/// stale. Writes reach the cache only after the remote accepted them, so the
/// cache never holds state the server has not confirmed.
///
/// Two reads issued before the first reload completes both fetch. Attach a
/// shared [`RequestDeduplicator`] with [`CachingService::with_deduplicator`]
/// to collapse them into one request.
///
/// # Type Parameters
///
/// * `T` - The cached entity type
/// * `S` - The local store implementation
/// * `R` - The remote repository implementation
pub struct CachingService<T, S, R>
where
    T: Entity,
    S: Store<T>,
    R: Repository<T>,
{
    store: Arc<S>,
    remote: Arc<R>,
    reload: ReloadState,
    dedup: Option<Arc<RequestDeduplicator>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S, R> CachingService<T, S, R>
where
    T: Entity,
    S: Store<T>,
    R: Repository<T> + 'static,
{
    /// Creates a new caching service.
    ///
    /// # Arguments
    ///
    /// * `store` - The local cache
    /// * `remote` - The source of truth
    /// * `reload` - Reload state, usually bound to the application session
    pub fn new(store: Arc<S>, remote: Arc<R>, reload: ReloadState) -> Self {
        Self {
            store,
            remote,
            reload,
            dedup: None,
            _entity: PhantomData,
        }
    }

    /// Routes full fetches through `dedup` under [`fetch_all_operation`].
    pub fn with_deduplicator(mut self, dedup: Arc<RequestDeduplicator>) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Returns true if the cache was fully reloaded in the current session.
    pub fn has_reloaded(&self) -> bool {
        self.reload.has_reloaded()
    }

    /// Marks the cache stale so the next read reloads it.
    pub fn invalidate(&self) {
        self.reload.reset();
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns every entity, reloading from the remote first if needed.
    pub async fn get_all(&self) -> Result<Vec<T>> {
        if self.reload.has_reloaded() {
            tracing::trace!(collection = T::COLLECTION, "Serving collection from cache");
            return Ok(self.store.find_all().await?);
        }
        self.reload_from_remote().await
    }

    /// Looks up one entity, reloading from the remote first if needed.
    pub async fn get_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        if !self.reload.has_reloaded() {
            self.reload_from_remote().await?;
        }
        Ok(self.store.find_by_key(key).await?)
    }

    /// Saves remotely, then caches the server-confirmed value.
    pub async fn save(&self, entity: &T) -> Result<T> {
        let confirmed = self
            .remote
            .save(entity)
            .await
            .map_err(SyncError::RemoteWrite)?;
        let cached = self.store.save(confirmed).await?;

        tracing::debug!(collection = T::COLLECTION, key = %cached.key(), "Entity saved");
        Ok(cached)
    }

    /// Deletes remotely, then removes the entity from the cache.
    pub async fn delete(&self, entity: &T) -> Result<()> {
        self.remote
            .delete(entity)
            .await
            .map_err(SyncError::RemoteWrite)?;
        self.store.delete(entity).await?;

        tracing::debug!(collection = T::COLLECTION, key = %entity.key(), "Entity deleted");
        Ok(())
    }

    /// Re-fetches one entity and updates the cache to match the server.
    ///
    /// Removes the cached copy if the server no longer has it. Does not change
    /// the reload state.
    pub async fn refresh(&self, key: &T::Key) -> Result<Option<T>> {
        let fresh = self
            .remote
            .fetch_by_key(key)
            .await
            .map_err(SyncError::RemoteFetch)?;

        match fresh {
            Some(entity) => Ok(Some(self.store.save(entity).await?)),
            None => {
                self.store.delete_by_key(key).await?;
                Ok(None)
            }
        }
    }

    /// Replaces the cache with a full remote fetch.
    async fn reload_from_remote(&self) -> Result<Vec<T>> {
        let generation = self.reload.session().generation();
        let fresh = self.fetch_all().await.map_err(SyncError::RemoteFetch)?;

        self.store.delete_all().await?;
        let saved = self.store.save_all(fresh).await?;
        self.reload.mark_reloaded(generation);

        tracing::debug!(
            collection = T::COLLECTION,
            count = saved.len(),
            generation,
            "Collection reloaded from remote"
        );
        Ok(saved)
    }

    async fn fetch_all(&self) -> remote::Result<Vec<T>> {
        match &self.dedup {
            Some(dedup) => {
                let remote = Arc::clone(&self.remote);
                dedup
                    .run(&fetch_all_operation::<T>(), move || async move {
                        remote.fetch_all().await
                    })
                    .await
            }
            None => self.remote.fetch_all().await,
        }
    }
}
