//! Application hooks around the pipeline.
//!
//! # Responsibilities
//! - `Handle`: wrap `resolve`, transform the request or short-circuit
//! - `GetSession`: derive the session value from a request
//! - `HandleError`: report fatal pipeline errors
//! - external fetch: the transport for loads calling other origins

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::load::{Fetch, NetworkFetch};
use crate::server::request::{ServerRequest, ServerResponse};

/// Continues the pipeline. `Ok(None)` means nothing served the request,
/// which only happens for internal requests issued by loads.
pub type Resolve =
    Box<dyn FnOnce(ServerRequest) -> BoxFuture<'static, Result<Option<ServerResponse>>> + Send>;

/// Request-transform hook. Call `resolve` at most once, or return a response
/// of your own.
#[async_trait]
pub trait Handle: Send + Sync {
    async fn handle(
        &self,
        request: ServerRequest,
        resolve: Resolve,
    ) -> Result<Option<ServerResponse>>;
}

/// Passes every request straight to `resolve`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl Handle for Passthrough {
    async fn handle(
        &self,
        request: ServerRequest,
        resolve: Resolve,
    ) -> Result<Option<ServerResponse>> {
        resolve(request).await
    }
}

/// Adapter turning an async closure into a [`Handle`].
pub struct HandleFn<F>(F);

pub fn handle_fn<F, Fut>(f: F) -> HandleFn<F>
where
    F: Fn(ServerRequest, Resolve) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<ServerResponse>>> + Send,
{
    HandleFn(f)
}

#[async_trait]
impl<F, Fut> Handle for HandleFn<F>
where
    F: Fn(ServerRequest, Resolve) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<ServerResponse>>> + Send,
{
    async fn handle(
        &self,
        request: ServerRequest,
        resolve: Resolve,
    ) -> Result<Option<ServerResponse>> {
        (self.0)(request, resolve).await
    }
}

/// Several handle hooks run in order, each one's `resolve` invoking the next.
#[derive(Clone)]
pub struct Sequence {
    handles: Arc<[Arc<dyn Handle>]>,
}

/// Chain `handles` so the first wraps the second, and so on.
pub fn sequence(handles: Vec<Arc<dyn Handle>>) -> Sequence {
    Sequence {
        handles: handles.into(),
    }
}

fn run_from(
    handles: Arc<[Arc<dyn Handle>]>,
    index: usize,
    request: ServerRequest,
    resolve: Resolve,
) -> BoxFuture<'static, Result<Option<ServerResponse>>> {
    async move {
        let Some(handle) = handles.get(index).cloned() else {
            return resolve(request).await;
        };
        let next: Resolve =
            Box::new(move |request: ServerRequest| run_from(handles, index + 1, request, resolve));
        handle.handle(request, next).await
    }
    .boxed()
}

#[async_trait]
impl Handle for Sequence {
    async fn handle(
        &self,
        request: ServerRequest,
        resolve: Resolve,
    ) -> Result<Option<ServerResponse>> {
        run_from(self.handles.clone(), 0, request, resolve).await
    }
}

/// Session provider, invoked once per page request.
#[async_trait]
pub trait GetSession: Send + Sync {
    async fn get_session(&self, request: &ServerRequest) -> Result<Value>;
}

#[async_trait]
impl<F> GetSession for F
where
    F: Fn(&ServerRequest) -> Value + Send + Sync,
{
    async fn get_session(&self, request: &ServerRequest) -> Result<Value> {
        Ok(self(request))
    }
}

/// Fatal error reporter, invoked at most once per failed request.
pub trait HandleError: Send + Sync {
    fn handle_error(&self, error: &Error, request: &ServerRequest);
}

impl<F> HandleError for F
where
    F: Fn(&Error, &ServerRequest) + Send + Sync,
{
    fn handle_error(&self, error: &Error, request: &ServerRequest) {
        self(error, request)
    }
}

/// Logs the error with the request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogError;

impl HandleError for LogError {
    fn handle_error(&self, error: &Error, request: &ServerRequest) {
        tracing::error!(
            path = %request.path,
            method = %request.method,
            error = %error,
            "Request failed"
        );
    }
}

/// The hook set the pipeline calls.
#[derive(Clone)]
pub struct Hooks {
    pub handle: Arc<dyn Handle>,
    pub get_session: Arc<dyn GetSession>,
    pub handle_error: Arc<dyn HandleError>,
    pub external_fetch: Arc<dyn Fetch>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            handle: Arc::new(Passthrough),
            get_session: Arc::new(|_: &ServerRequest| Value::Null),
            handle_error: Arc::new(LogError),
            external_fetch: Arc::new(NetworkFetch::default()),
        }
    }
}

impl Hooks {
    pub fn with_handle(mut self, handle: impl Handle + 'static) -> Self {
        self.handle = Arc::new(handle);
        self
    }

    pub fn with_session(mut self, get_session: impl GetSession + 'static) -> Self {
        self.get_session = Arc::new(get_session);
        self
    }

    pub fn with_error_handler(mut self, handle_error: impl HandleError + 'static) -> Self {
        self.handle_error = Arc::new(handle_error);
        self
    }

    pub fn with_external_fetch(mut self, fetch: impl Fetch + 'static) -> Self {
        self.external_fetch = Arc::new(fetch);
        self
    }
}
