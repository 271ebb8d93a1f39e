//! The load contract and its access-tracked input.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::load::fetch::{Fetch, FetchInit, FetchRequest, FetchResponse, SerializedFetch};
use crate::load::output::LoadOutput;
use crate::load::page::{PageContext, Query};
use crate::load::tracker::Trace;
use crate::load::Stuff;
use crate::routing::Params;

/// A segment's data-loading contract.
///
/// Returning `Ok(None)` on a leaf declines the route so the next candidate
/// is tried. Returning an `Err` is treated like an error payload whose
/// status is [`Error::status`].
#[async_trait]
pub trait Load: Send + Sync {
    async fn load(&self, input: LoadInput) -> Result<Option<LoadOutput>>;
}

/// Adapter turning an async closure into a [`Load`].
pub struct LoadFn<F>(F);

/// Wrap `f` as a [`Load`].
pub fn load_fn<F, Fut>(f: F) -> LoadFn<F>
where
    F: Fn(LoadInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<LoadOutput>>> + Send,
{
    LoadFn(f)
}

#[async_trait]
impl<F, Fut> Load for LoadFn<F>
where
    F: Fn(LoadInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<LoadOutput>>> + Send,
{
    async fn load(&self, input: LoadInput) -> Result<Option<LoadOutput>> {
        (self.0)(input).await
    }
}

/// Everything a load may read. Every getter except [`PageView::origin`]
/// records the access.
pub struct LoadInput {
    pub(crate) page: Arc<PageContext>,
    pub(crate) session: Arc<Value>,
    pub(crate) stuff: Stuff,
    pub(crate) fetch: Arc<dyn Fetch>,
    pub(crate) failure: Option<(u16, Error)>,
    pub(crate) trace: Arc<Trace>,
}

impl LoadInput {
    pub fn page(&self) -> PageView<'_> {
        PageView {
            page: &self.page,
            trace: &self.trace,
        }
    }

    pub fn session(&self) -> &Value {
        self.trace.session();
        &self.session
    }

    /// Stuff merged from every segment above this one.
    pub fn stuff(&self) -> &Stuff {
        self.trace.stuff();
        &self.stuff
    }

    /// Status of the failure an error boundary is rendering.
    pub fn status(&self) -> Option<u16> {
        self.failure.as_ref().map(|(status, _)| *status)
    }

    /// The failure an error boundary is rendering.
    pub fn error(&self) -> Option<&Error> {
        self.failure.as_ref().map(|(_, error)| error)
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.fetch_with(url, FetchInit::default()).await
    }

    /// Fetch `url` relative to the current page. The resolved href becomes
    /// a dependency that can later be invalidated.
    pub async fn fetch_with(&self, url: &str, init: FetchInit) -> Result<FetchResponse> {
        let href = self.resolve(url)?;
        self.trace.dependency(href.to_string());

        let request = FetchRequest {
            url: url.to_string(),
            href,
            init,
        };
        let response = self.fetch.fetch(request.clone()).await?;

        self.trace.fetched(
            SerializedFetch::record(&request, &response),
            response.set_cookies(),
            response.is_credentialed(),
        );
        Ok(response)
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        let invalid = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };
        let base = Url::parse(&self.page.origin)
            .and_then(|origin| origin.join(&self.page.path))
            .map_err(|e| invalid(format!("bad page URL: {e}")))?;
        base.join(url).map_err(|e| invalid(e.to_string()))
    }
}

/// Tracked view of the page a load runs for.
pub struct PageView<'a> {
    page: &'a PageContext,
    trace: &'a Trace,
}

impl<'a> PageView<'a> {
    pub fn origin(&self) -> &'a str {
        &self.page.origin
    }

    pub fn path(&self) -> &'a str {
        self.trace.path();
        &self.page.path
    }

    pub fn query(&self) -> &'a Query {
        self.trace.query();
        &self.page.query
    }

    /// A single path parameter. Only this name is recorded as read.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.trace.param(name);
        self.page.params.get(name).map(String::as_str)
    }

    /// All path parameters; records every name as read.
    pub fn params(&self) -> &'a Params {
        for name in self.page.params.keys() {
            self.trace.param(name);
        }
        &self.page.params
    }
}
