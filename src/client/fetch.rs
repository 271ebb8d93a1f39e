//! Fetch used by loads in the browser.
//!
//! Until the first render completes, requests are answered from the
//! responses the server recorded while rendering the page, so hydration
//! sees exactly what the server saw.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::hash::content_hash;
use crate::load::{Fetch, FetchRequest, FetchResponse, NetworkFetch, SerializedFetch};

pub struct HydrationFetch {
    recorded: Mutex<Vec<SerializedFetch>>,
    started: AtomicBool,
    network: Arc<dyn Fetch>,
}

impl HydrationFetch {
    pub fn new(network: Arc<dyn Fetch>) -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            network,
        }
    }

    /// Replace the recorded responses with the ones embedded in a page.
    pub fn prime(&self, fetched: Vec<SerializedFetch>) {
        *self.recorded.lock().unwrap_or_else(PoisonError::into_inner) = fetched;
        self.started.store(false, Ordering::Release);
    }

    /// Stop serving recorded responses.
    pub fn finish(&self) {
        self.started.store(true, Ordering::Release);
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn recorded(&self, request: &FetchRequest) -> Option<FetchResponse> {
        if self.started.load(Ordering::Acquire) {
            return None;
        }
        let body_hash = request
            .init
            .body
            .as_ref()
            .map(|body| content_hash(body.as_bytes()));
        let recorded = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        recorded
            .iter()
            .find(|entry| {
                entry.url == request.url
                    && (body_hash.is_none() || entry.body_hash == body_hash)
            })
            .map(SerializedFetch::to_response)
    }
}

impl Default for HydrationFetch {
    fn default() -> Self {
        Self::new(Arc::new(NetworkFetch::default()))
    }
}

#[async_trait]
impl Fetch for HydrationFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        if let Some(response) = self.recorded(&request) {
            tracing::trace!(url = %request.url, "Serving fetch from hydration data");
            return Ok(response);
        }
        self.network.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use axum::http::HeaderMap;
    use url::Url;

    use super::*;
    use crate::load::FetchInit;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl Fetch for Counting {
        async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResponse::new(200, HeaderMap::new(), "network"))
        }
    }

    fn request(url: &str, body: Option<&str>) -> FetchRequest {
        let init = match body {
            Some(body) => FetchInit::default().with_body(body),
            None => FetchInit::default(),
        };
        FetchRequest {
            url: url.to_string(),
            href: Url::parse("https://example.com").unwrap().join(url).unwrap(),
            init,
        }
    }

    fn recorded(url: &str, body: Option<&str>, text: &str) -> SerializedFetch {
        SerializedFetch {
            url: url.to_string(),
            body_hash: body.map(|b| content_hash(b.as_bytes())),
            status: 200,
            headers: BTreeMap::new(),
            body: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_recorded_responses_until_finished() {
        let network = Arc::new(Counting::default());
        let fetch = HydrationFetch::new(network.clone());
        fetch.prime(vec![
            recorded("/api/a", None, "a"),
            recorded("/api/q", Some("one"), "q1"),
        ]);

        assert_eq!(fetch.fetch(request("/api/a", None)).await.unwrap().text(), "a");
        assert_eq!(
            fetch.fetch(request("/api/q", Some("one"))).await.unwrap().text(),
            "q1"
        );
        // Different body, different request.
        assert_eq!(
            fetch.fetch(request("/api/q", Some("two"))).await.unwrap().text(),
            "network"
        );

        fetch.finish();
        assert_eq!(fetch.fetch(request("/api/a", None)).await.unwrap().text(), "network");
        assert_eq!(network.0.load(Ordering::SeqCst), 2);
    }
}
