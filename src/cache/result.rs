//! Time- and session-bounded cache of assembled navigation results.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::load::NavigationResult;
use crate::observability::metrics;

#[derive(Debug)]
struct Entry {
    result: Arc<NavigationResult>,
    expires_at: Instant,
    session_id: u64,
}

/// Navigation results keyed by `decoded_path?query`.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: Arc<DashMap<String, Entry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result for `key`, unless it expired or was stored under a
    /// different session.
    pub fn get(&self, key: &str, session_id: u64) -> Option<Arc<NavigationResult>> {
        let fresh = match self.entries.get(key) {
            Some(entry) if entry.session_id == session_id && Instant::now() < entry.expires_at => {
                Some(entry.result.clone())
            }
            Some(_) => None,
            None => {
                metrics::record_cache("miss");
                return None;
            }
        };

        if fresh.is_none() {
            self.entries.remove(key);
            metrics::record_cache("expired");
        } else {
            metrics::record_cache("hit");
        }
        fresh
    }

    /// Store `result` for `max_age` seconds.
    pub fn insert(
        &self,
        key: String,
        result: Arc<NavigationResult>,
        max_age: u64,
        session_id: u64,
    ) {
        tracing::debug!(key = %key, max_age, "Caching navigation result");
        self.entries.insert(
            key,
            Entry {
                result,
                expires_at: Instant::now() + Duration::from_secs(max_age),
                session_id,
            },
        );
        metrics::record_cache("insert");
    }

    /// Drop every entry stored under an older session.
    pub fn invalidate_session(&self, session_id: u64) {
        self.entries.retain(|_, entry| entry.session_id == session_id);
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_max_age() {
        let cache = ResultCache::new();
        let result = Arc::new(NavigationResult::default());
        cache.insert("/a?".into(), result.clone(), 5, 0);

        tokio::time::advance(Duration::from_secs(4)).await;
        let hit = cache.get("/a?", 0).unwrap();
        assert!(Arc::ptr_eq(&hit, &result));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("/a?", 0).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_session_change_invalidates() {
        let cache = ResultCache::new();
        cache.insert("/a?".into(), Arc::new(NavigationResult::default()), 60, 1);
        assert!(cache.get("/a?", 2).is_none());
        assert!(cache.is_empty());

        cache.insert("/b?".into(), Arc::new(NavigationResult::default()), 60, 1);
        cache.insert("/c?".into(), Arc::new(NavigationResult::default()), 60, 2);
        cache.invalidate_session(2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("/c?", 2).is_some());
    }
}
