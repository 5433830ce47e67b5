//! In-memory storage backend.
//!
//! Stores entities in a `BTreeMap` wrapped in `Arc<RwLock<_>>`. Useful for
//! tests and ephemeral caches where durability is not required.
//!
//! # Example
//!
//! ```rust,ignore
//! use rostersync::storage::memory::MemoryStore;
//! use rostersync_core::roster::Event;
//!
//! let store = MemoryStore::<Event>::new();
//! ```

mod store;

pub use store::MemoryStore;
