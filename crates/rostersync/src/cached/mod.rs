//! Read-through caching services.
//!
//! A [`CachingService`] pairs a local [`rostersync_core::storage::Store`] with
//! a remote [`rostersync_core::remote::Repository`]:
//!
//! - **Reads**: the first read of a session fetches the full collection and
//!   replaces the cache; later reads are served from the cache only
//! - **Writes**: go to the remote first and reach the cache only once the
//!   server accepted them
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let store = Arc::new(db.collection_for::<Event>()?);
//! let events = CachingService::new(store, Arc::new(api), ReloadState::standalone());
//!
//! let all = events.get_all().await?; // network
//! let again = events.get_all().await?; // cache
//! ```

mod error;
mod service;

pub use error::{Result, SyncError};
pub use service::{fetch_all_operation, CachingService};
