//! Roster entities mirrored from the remote API.

mod types;

pub use types::{Event, Position, Qualification, User};
