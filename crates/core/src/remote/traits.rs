use async_trait::async_trait;

use crate::storage::Entity;

use super::Result;

/// Network-backed source of truth for one entity type.
///
/// Implementations wrap the remote API transport. Every failure (timeouts,
/// non-2xx responses, decode errors) is reported as a [`super::RemoteError`].
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Fetches the full collection.
    async fn fetch_all(&self) -> Result<Vec<T>>;

    /// Fetches a single entity by key.
    ///
    /// The default scans [`Repository::fetch_all`]; override it when the API
    /// exposes a per-key endpoint.
    async fn fetch_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        let all = self.fetch_all().await?;
        Ok(all.into_iter().find(|entity| entity.key() == *key))
    }

    /// Persists an entity remotely and returns the value the server accepted.
    async fn save(&self, entity: &T) -> Result<T>;

    /// Deletes an entity remotely.
    async fn delete(&self, entity: &T) -> Result<()>;
}
