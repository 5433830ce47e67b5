//! In-memory store implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use rostersync_core::storage::{Entity, Result, Store};

/// In-memory storage backend for one collection.
///
/// `find_all` returns entities ordered by key. Clones share the same map, so a
/// handle can be passed to several owners. Data is lost when the last handle
/// is dropped.
#[derive(Clone)]
pub struct MemoryStore<T: Entity> {
    entities: Arc<RwLock<BTreeMap<T::Key, T>>>,
}

impl<T: Entity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> MemoryStore<T> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

#[async_trait]
impl<T: Entity> Store<T> for MemoryStore<T> {
    async fn count(&self) -> Result<usize> {
        Ok(self.entities.read().await.len())
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        let entities = self.entities.read().await;
        Ok(entities.values().cloned().collect())
    }

    async fn find_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        let entities = self.entities.read().await;
        Ok(entities.get(key).cloned())
    }

    async fn save(&self, entity: T) -> Result<T> {
        let mut entities = self.entities.write().await;
        entities.insert(entity.key(), entity.clone());
        Ok(entity)
    }

    async fn save_all(&self, batch: Vec<T>) -> Result<Vec<T>> {
        let mut entities = self.entities.write().await;
        for entity in &batch {
            entities.insert(entity.key(), entity.clone());
        }
        Ok(batch)
    }

    async fn delete_by_key(&self, key: &T::Key) -> Result<()> {
        self.entities.write().await.remove(key);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.entities.write().await.clear();
        Ok(())
    }
}
