//! Test doubles shared by unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use rostersync_core::remote::{RemoteError, Repository, Result};
use rostersync_core::storage::Entity;

/// Remote repository that keeps its data in memory and counts calls.
pub struct MockRepository<T: Entity> {
    entities: RwLock<BTreeMap<T::Key, T>>,
    fetch_delay: Option<Duration>,
    fail_fetch: AtomicBool,
    fail_writes: AtomicBool,
    pub fetch_all_calls: AtomicUsize,
    pub save_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl<T: Entity> MockRepository<T> {
    pub fn new(entities: Vec<T>) -> Self {
        Self {
            entities: RwLock::new(entities.into_iter().map(|e| (e.key(), e)).collect()),
            fetch_delay: None,
            fail_fetch: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fetch_all_calls: AtomicUsize::new(0),
            save_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Makes every full fetch take `delay`.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Changes server-side data without going through the service.
    pub async fn insert(&self, entity: T) {
        self.entities.write().await.insert(entity.key(), entity);
    }

    pub async fn remove(&self, key: &T::Key) {
        self.entities.write().await.remove(key);
    }

    pub fn fetches(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MockRepository<T> {
    async fn fetch_all(&self) -> Result<Vec<T>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.entities.read().await.values().cloned().collect())
    }

    async fn fetch_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Timeout("fetch_by_key".to_string()));
        }
        Ok(self.entities.read().await.get(key).cloned())
    }

    async fn save(&self, entity: &T) -> Result<T> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        self.entities
            .write()
            .await
            .insert(entity.key(), entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, entity: &T) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        self.entities.write().await.remove(&entity.key());
        Ok(())
    }
}
