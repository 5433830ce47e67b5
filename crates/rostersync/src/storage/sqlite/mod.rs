//! SQLite storage backend.
//!
//! A [`Database`] is one SQLite file holding a fixed set of named collections
//! (one table each) under an integer schema version (`PRAGMA user_version`).
//! Uses `rusqlite` for synchronous access and `tokio-rusqlite` for async
//! wrapping.
//!
//! # Cache contract
//!
//! Collections hold disposable copies of server-owned data. Any rename,
//! addition or removal of a collection requires a version bump, and the
//! default [`DropAndRecreate`] migration wipes every collection on upgrade,
//! not just the changed one. A database that cannot be opened is deleted and
//! reopened once; a second failure is fatal.

mod conversions;
mod database;
mod error;
mod migration;
mod schema;
mod store;

pub use database::{database_path, delete_database, Database, DatabaseSchema, MAX_OPEN_ATTEMPTS};
pub use migration::{DropAndRecreate, Migration, Upgrade};
pub use store::SqliteStore;
