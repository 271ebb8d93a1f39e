//! De-duplication of concurrent work by key.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

/// A future every caller for the same key awaits.
pub type Flight<V> = Shared<BoxFuture<'static, V>>;

/// In-flight operations keyed by request identity.
#[derive(Clone)]
pub struct SingleFlight<V: Clone> {
    inflight: Arc<DashMap<String, Flight<V>>>,
}

impl<V: Clone> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `key`, starting it with `start` if none exists.
    pub fn run<F, Fut>(&self, key: &str, start: F) -> Flight<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        self.inflight
            .entry(key.to_string())
            .or_insert_with(|| start().boxed().shared())
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Flight<V>> {
        self.inflight.get(key).map(|flight| flight.clone())
    }

    /// Forget `key` so the next caller starts fresh.
    pub fn forget(&self, key: &str) {
        self.inflight.remove(key);
    }

    pub fn clear(&self) {
        self.inflight.clear();
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let flights: SingleFlight<u32> = SingleFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let start = |runs: Arc<AtomicUsize>| {
            move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                7
            }
        };

        let a = flights.run("/a?", start(runs.clone()));
        let b = flights.run("/a?", start(runs.clone()));
        assert_eq!(tokio::join!(a, b), (7, 7));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        flights.forget("/a?");
        assert_eq!(flights.run("/a?", start(runs.clone())).await, 7);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
