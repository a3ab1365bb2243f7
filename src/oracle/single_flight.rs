use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};

struct Flight<V> {
    id: u64,
    future: WeakShared<BoxFuture<'static, V>>,
}

/// Coalesces concurrent work by key: while a future for `key` is in flight, later callers
/// await that same future instead of starting their own.
///
/// Nothing is memoized. The entry is dropped as soon as the shared future resolves, so a
/// failure is only ever seen by the callers that were already waiting on it. The map only
/// holds weak handles: once every caller has gone away the work itself is dropped.
pub struct SingleFlight<K, V>
where
    V: Clone,
{
    in_flight: Mutex<HashMap<K, Flight<V>>>,
    next_id: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V>
where
    V: Clone,
{
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (shared, id) = {
            let mut guard = self.in_flight.lock().unwrap_or_else(|err| err.into_inner());
            let joined = guard.get(&key).and_then(|flight| {
                flight
                    .future
                    .upgrade()
                    .map(|shared| (shared, flight.id))
            });
            match joined {
                Some(joined) => {
                    tracing::trace!(target: "single_flight", "joined_in_flight_call");
                    joined
                }
                None => {
                    guard.retain(|_, flight| flight.future.upgrade().is_some());
                    let shared: Shared<BoxFuture<'static, V>> = make().boxed().shared();
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    if let Some(future) = shared.downgrade() {
                        guard.insert(key.clone(), Flight { id, future });
                    }
                    (shared, id)
                }
            }
        };

        let value = shared.await;

        let mut guard = self.in_flight.lock().unwrap_or_else(|err| err.into_inner());
        if guard.get(&key).is_some_and(|flight| flight.id == id) {
            guard.remove(&key);
        }

        value
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .values()
            .filter(|flight| flight.future.upgrade().is_some())
            .count()
    }
}
