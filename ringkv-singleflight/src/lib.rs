//! Per-key call coalescing.
//!
//! While a call for a key is in flight, concurrent callers for the same key
//! await the same future instead of starting their own; the loader runs
//! exactly once per in-flight window regardless of how many callers ask for
//! it. The call that starts the load is the one responsible for clearing
//! the in-flight record once it completes, mirroring the classic
//! lock/check/insert/unlock/wait/leader-deletes shape.

use std::collections::HashMap;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

/// Error produced by a coalesced call: either the loader's own error, or a
/// note that the loader task panicked (waiters still get an `Err`, never a
/// hung future or a propagated panic).
#[derive(Debug, Clone)]
pub enum FlightError<E> {
    Inner(E),
    Panicked(String),
}

impl<E: std::fmt::Display> std::fmt::Display for FlightError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightError::Inner(e) => write!(f, "{e}"),
            FlightError::Panicked(msg) => write!(f, "loader panicked: {msg}"),
        }
    }
}

type CoalescedFuture<V, E> = Shared<BoxFuture<'static, Result<V, FlightError<E>>>>;

/// A single-flight group for one value/error pair.
pub struct SingleFlight<V, E> {
    inflight: Mutex<HashMap<String, CoalescedFuture<V, E>>>,
}

impl<V, E> Default for SingleFlight<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> SingleFlight<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    pub fn new() -> Self {
        SingleFlight {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of calls currently in flight, for diagnostics.
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Runs `f()` for `key`, coalescing concurrent callers. `f` is only
    /// invoked for the first caller to reach a given key while no call for
    /// that key is in flight.
    pub async fn do_call<F, Fut>(&self, key: &str, f: F) -> Result<V, FlightError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.do_call_leading(key, f).await.0
    }

    /// Like `do_call`, but also reports whether this call led the in-flight
    /// load (`true`) or joined one already running (`false`). Callers that
    /// want a coalesce count use the leader bit to tell the two apart.
    pub async fn do_call_leading<F, Fut>(
        &self,
        key: &str,
        f: F,
    ) -> (Result<V, FlightError<E>>, bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (shared, is_leader) = {
            let mut map = self.inflight.lock();
            if let Some(existing) = map.get(key) {
                (existing.clone(), false)
            } else {
                let task = tokio::spawn(f());
                let fut: BoxFuture<'static, Result<V, FlightError<E>>> = Box::pin(async move {
                    match task.await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(FlightError::Inner(err)),
                        Err(join_err) => Err(FlightError::Panicked(join_err.to_string())),
                    }
                });
                let shared = fut.shared();
                map.insert(key.to_string(), shared.clone());
                (shared, true)
            }
        };

        let result = shared.await;

        if is_leader {
            self.inflight.lock().remove(key);
        }

        (result, is_leader)
    }
}
