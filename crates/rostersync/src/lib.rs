//! Client-side caching and synchronization for the roster API.
//!
//! - [`storage`]: in-memory and SQLite-backed implementations of the
//!   [`rostersync_core::storage::Store`] port.
//! - [`cached`]: the fetch-once-per-session caching service.
//! - [`dedup`]: collapses concurrent identical in-flight operations.
//! - [`session`]: reload tokens shared by caching services.
//! - [`context`]: application-lifetime wiring of all of the above.

pub mod cached;
pub mod config;
pub mod context;
pub mod dedup;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;
