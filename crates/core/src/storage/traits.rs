use std::fmt::{Debug, Display};
use std::hash::Hash;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::Result;

/// Marker for types usable as an entity key.
///
/// Keys are compared, ordered and hashed by the in-memory backend and
/// JSON-encoded by the durable one, so strings, integers and UUIDs all qualify.
pub trait EntityKey:
    Clone + Eq + Ord + Hash + Debug + Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> EntityKey for K where
    K: Clone
        + Eq
        + Ord
        + Hash
        + Debug
        + Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// A record mirrored from the remote API into a local collection.
///
/// Stores never inspect an entity beyond its key.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique, stable identifier within the collection.
    type Key: EntityKey;

    /// Name of the collection holding this entity type.
    const COLLECTION: &'static str;

    /// Returns the entity's key.
    fn key(&self) -> Self::Key;
}

/// Keyed persistence for one collection of entities.
///
/// `save` and `save_all` are upserts. Deleting an absent key is a no-op.
#[async_trait]
pub trait Store<T: Entity>: Send + Sync {
    /// Returns the number of stored entities.
    async fn count(&self) -> Result<usize>;

    /// Returns every stored entity. Ordering is defined by the implementation.
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Looks up an entity by key.
    async fn find_by_key(&self, key: &T::Key) -> Result<Option<T>>;

    /// Inserts or overwrites an entity, returning the stored value.
    async fn save(&self, entity: T) -> Result<T>;

    /// Upserts a batch. When the input repeats a key, the later element wins.
    async fn save_all(&self, entities: Vec<T>) -> Result<Vec<T>>;

    /// Removes the entity stored under `key`, if any.
    async fn delete_by_key(&self, key: &T::Key) -> Result<()>;

    /// Removes `entity` by its key, if present.
    async fn delete(&self, entity: &T) -> Result<()> {
        let key = entity.key();
        self.delete_by_key(&key).await
    }

    /// Empties the collection.
    async fn delete_all(&self) -> Result<()>;
}
