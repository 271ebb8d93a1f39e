//! Access tracking for load inputs.
//!
//! Loads are plain async functions that read what they need, possibly
//! conditionally. Every tracked getter on [`LoadInput`](crate::load::LoadInput)
//! records into a [`Trace`] before returning, and the finished trace becomes
//! the node's [`Uses`], the only input to the re-run decision.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::load::fetch::SerializedFetch;

/// Which inputs a load actually dereferenced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Uses {
    pub path: bool,
    pub query: bool,
    pub session: bool,
    pub stuff: bool,
    pub params: BTreeSet<String>,
    /// Absolute hrefs fetched by the load.
    pub dependencies: Vec<String>,
}

/// Everything observed while one load ran.
#[derive(Debug, Clone, Default)]
pub struct TraceRecord {
    pub uses: Uses,
    /// A fetch forwarded cookies or authorization.
    pub credentialed: bool,
    pub fetched: Vec<SerializedFetch>,
    pub set_cookies: Vec<String>,
}

/// Side channel shared between a [`LoadInput`](crate::load::LoadInput) and
/// the engine.
#[derive(Debug, Default)]
pub struct Trace {
    record: Mutex<TraceRecord>,
}

impl Trace {
    fn lock(&self) -> MutexGuard<'_, TraceRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn path(&self) {
        self.lock().uses.path = true;
    }

    pub(crate) fn query(&self) {
        self.lock().uses.query = true;
    }

    pub(crate) fn session(&self) {
        self.lock().uses.session = true;
    }

    pub(crate) fn stuff(&self) {
        self.lock().uses.stuff = true;
    }

    pub(crate) fn param(&self, name: &str) {
        let mut record = self.lock();
        if !record.uses.params.contains(name) {
            record.uses.params.insert(name.to_string());
        }
    }

    pub(crate) fn dependency(&self, href: String) {
        self.lock().uses.dependencies.push(href);
    }

    pub(crate) fn fetched(
        &self,
        fetch: SerializedFetch,
        set_cookies: Vec<String>,
        credentialed: bool,
    ) {
        let mut record = self.lock();
        record.fetched.push(fetch);
        record.set_cookies.extend(set_cookies);
        record.credentialed |= credentialed;
    }

    /// Snapshot of what has been recorded so far.
    pub fn snapshot(&self) -> TraceRecord {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_records_reads() {
        let trace = Trace::default();
        trace.path();
        trace.param("slug");
        trace.param("slug");
        trace.dependency("https://example.com/api".into());

        let record = trace.snapshot();
        assert!(record.uses.path);
        assert!(!record.uses.query);
        assert_eq!(record.uses.params.len(), 1);
        assert_eq!(record.uses.dependencies, vec!["https://example.com/api".to_string()]);
    }
}
