//! Single-flight execution.
//!
//! Concurrent callers of [`SingleFlight::run`] share one in-progress future
//! instead of each starting their own. Once it resolves the slot is cleared,
//! so the next call starts a fresh one.

use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

/// At most one in-flight future at a time, shared by all waiters.
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.slot.lock().is_some())
            .finish()
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight future, or start one with `make`.
    ///
    /// `make` is only invoked when nothing is in flight.
    pub async fn run<F, Fut>(&self, make: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                // A finished flight nobody cleared is stale
                Some(current) if current.peek().is_none() => current.clone(),
                _ => {
                    let fresh = make().boxed().shared();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let output = flight.clone().await;

        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&flight)) {
            *slot = None;
        }
        output
    }

    /// Whether a future is currently in flight.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|current| current.peek().is_none())
    }
}
