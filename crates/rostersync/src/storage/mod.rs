//! Storage backend implementations.
//!
//! Concrete implementations of the [`rostersync_core::storage::Store`] port:
//!
//! - [`memory`]: process-local map, lost when dropped
//! - [`sqlite`]: versioned SQLite database with one table per collection

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{database_path, delete_database, Database, DatabaseSchema, SqliteStore};
