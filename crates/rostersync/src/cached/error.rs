use thiserror::Error;

use rostersync_core::remote::RemoteError;
use rostersync_core::storage::StoreError;

/// Errors surfaced by caching services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The full fetch of a forced reload failed. The cache is unchanged and
    /// the next read retries.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(RemoteError),
    /// A remote save or delete failed. The cache is unchanged.
    #[error("Remote write failed: {0}")]
    RemoteWrite(RemoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for caching service operations.
pub type Result<T> = std::result::Result<T, SyncError>;
