//! Session tokens that decide when a caching service must reload.
//!
//! A [`Session`] carries a generation number shared by every caching service
//! of the application. Each service owns a [`ReloadState`] recording the
//! generation of its last successful full reload; it is fresh only while that
//! matches the session's current generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation value meaning "never reloaded". Sessions start at 1.
const NEVER: u64 = 0;

/// Application session shared by caching services.
#[derive(Debug)]
pub struct Session {
    generation: AtomicU64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            generation: AtomicU64::new(1),
        }
    }
}

impl Session {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the current generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Starts a new generation, making every [`ReloadState`] stale.
    ///
    /// Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        let next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation = next, "Session invalidated");
        next
    }
}

/// Reload state of one caching service.
#[derive(Debug)]
pub struct ReloadState {
    session: Arc<Session>,
    reloaded_at: AtomicU64,
}

impl ReloadState {
    /// Creates a state that has not reloaded in `session`.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            reloaded_at: AtomicU64::new(NEVER),
        }
    }

    /// Creates a state bound to a private session.
    pub fn standalone() -> Self {
        Self::new(Session::new())
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Returns true if a full reload completed in the current generation.
    pub fn has_reloaded(&self) -> bool {
        self.reloaded_at.load(Ordering::SeqCst) == self.session.generation()
    }

    /// Records a full reload that started during `generation`.
    ///
    /// Pass the generation observed *before* fetching: if the session was
    /// invalidated meanwhile, the state stays stale.
    pub fn mark_reloaded(&self, generation: u64) {
        self.reloaded_at.store(generation, Ordering::SeqCst);
    }

    /// Forgets the last reload so the next read fetches again.
    pub fn reset(&self) {
        self.reloaded_at.store(NEVER, Ordering::SeqCst);
    }
}
