//! Collapses concurrent identical in-flight operations.
//!
//! While an operation is registered under a name, further callers for that
//! name attach to it instead of starting their own. Every caller receives its
//! own clone of the result; errors are cloned to every caller unchanged.
//!
//! Names identify *what* is fetched, not *who* asked for it: use stable,
//! entity-qualified names such as `"events:fetch_all"`. Two operations sharing
//! a name are merged even if they would have returned different data.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

type SharedOutcome<T, E> = Shared<BoxFuture<'static, Result<Arc<T>, E>>>;
type Registry = Arc<Mutex<HashMap<String, Pending>>>;

/// One in-flight operation. `future` holds a `SharedOutcome<T, E>`.
struct Pending {
    id: u64,
    future: Box<dyn Any + Send + Sync>,
}

/// Removes a registration when the operation completes, fails or panics.
struct Unregister {
    registry: Registry,
    name: String,
    id: u64,
}

impl Drop for Unregister {
    fn drop(&mut self) {
        let mut pending = lock(&self.registry);
        if pending.get(&self.name).is_some_and(|entry| entry.id == self.id) {
            pending.remove(&self.name);
        }
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, Pending>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of in-flight operations keyed by name.
///
/// Each name moves `Idle -> InFlight -> Idle`. The registration is removed
/// exactly once, when the operation settles, however many callers attached.
/// Construct one per application (or per test) and share it via `Arc`.
#[derive(Default)]
pub struct RequestDeduplicator {
    pending: Registry,
    next_id: AtomicU64,
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `operation` under `name`, or attaches to the one already running.
    ///
    /// `operation` is only invoked when nothing is registered under `name`.
    /// The operation is driven to completion by a background task, so it
    /// settles and unregisters even if every caller stops waiting.
    ///
    /// If `name` is in flight with a different result type, the call runs
    /// un-deduplicated and a warning is logged.
    pub async fn run<T, E, F, Fut>(&self, name: &str, operation: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        // The registry lock is never held across an await.
        let slot = {
            let mut pending = lock(&self.pending);
            let existing = pending
                .get(name)
                .map(|entry| entry.future.downcast_ref::<SharedOutcome<T, E>>().cloned());

            match existing {
                Some(Some(shared)) => {
                    tracing::debug!(operation = name, "Attaching to in-flight operation");
                    Ok(shared)
                }
                Some(None) => Err(operation()),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let shared = self.register(name, id, operation());
                    pending.insert(
                        name.to_string(),
                        Pending {
                            id,
                            future: Box::new(shared.clone()),
                        },
                    );
                    tokio::spawn(shared.clone());
                    tracing::debug!(operation = name, "Started operation");
                    Ok(shared)
                }
            }
        };

        match slot {
            Ok(shared) => shared.await.map(|value| T::clone(&value)),
            Err(unshared) => {
                tracing::warn!(
                    operation = name,
                    "In-flight operation has a different result type, running without deduplication"
                );
                unshared.await
            }
        }
    }

    /// Wraps `operation` so it removes its own registration when it settles.
    fn register<T, E, Fut>(&self, name: &str, id: u64, operation: Fut) -> SharedOutcome<T, E>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let guard = Unregister {
            registry: Arc::clone(&self.pending),
            name: name.to_string(),
            id,
        };

        async move {
            let guard = guard;
            let outcome = operation.await.map(Arc::new);
            tracing::trace!(operation = %guard.name, ok = outcome.is_ok(), "Operation settled");
            drop(guard);
            outcome
        }
        .boxed()
        .shared()
    }

    /// Returns true if an operation is registered under `name`.
    pub fn is_pending(&self, name: &str) -> bool {
        lock(&self.pending).contains_key(name)
    }

    /// Returns the number of registered operations.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}
