//! Core contracts for rostersync.
//!
//! Pure domain layer: entity types, the storage port every cache backend
//! implements, and the repository contract of the remote API. No I/O lives
//! here.

pub mod remote;
pub mod roster;
pub mod storage;
