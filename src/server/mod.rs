//! Server Response Pipeline
//!
//! # Data Flow
//! ```text
//! IncomingRequest
//!     → trailing-slash policy (301 on mismatch)
//!     → body parsing by content type
//!     → Hooks::handle(request, resolve)
//!         → resolve: match routes in declaration order
//!             → endpoint → EndpointOutput
//!             → page     → LoadEngine (ServerFetch as the fetch capability)
//!             → 200 responses get an ETag, or become 304
//!         → nothing matched and not an internal fetch → 404 error page
//!     → uncaught error → HandleError once → 500
//! ```
//!
//! # Design Decisions
//! - Internal fetches from loads re-enter [`Server::respond`] in-process
//! - Requests share nothing except the state of a prerender pass
//! - Request timeouts belong to the host (see `http`), not here

pub mod body;
pub mod endpoint;
pub mod etag;
pub mod fetch;
pub mod hooks;
pub mod page;
pub mod render;
pub mod request;

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::FutureExt;
use serde_json::Value;

use crate::cache::{ResultCache, SingleFlight};
use crate::error::{Error, Result};
use crate::load::{LoadContext, LoadEngine};
use crate::routing::{decode_path, Manifest, Route, TrailingSlash};
use self::page::RequestSession;

pub use body::{parse_body, RequestBody};
pub use endpoint::{endpoint_fn, Endpoint, EndpointBody, EndpointOutput};
pub use fetch::ServerFetch;
pub use hooks::{handle_fn, sequence, GetSession, Handle, HandleError, Hooks, Resolve};
pub use render::{HtmlShell, HydrationData, PageRenderer};
pub use request::{IncomingRequest, ServerRequest, ServerResponse};

/// Static pipeline options.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    pub trailing_slash: TrailingSlash,
    /// Path prefix the app is mounted under, without trailing slash.
    pub base: String,
    /// Prefix assets are served from; defaults to `base` when empty.
    pub assets: String,
    /// Expose debug error detail in responses.
    pub dev: bool,
}

/// State shared by every request of one prerender pass.
#[derive(Default)]
pub struct PrerenderState {
    /// Render an empty shell instead of the requested page.
    pub fallback: bool,
    /// Responses of internal fetches made during the pass, by path.
    pub dependencies: DashMap<String, ServerResponse>,
    inflight: SingleFlight<Option<ServerResponse>>,
    cache: Arc<ResultCache>,
}

impl PrerenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback() -> Self {
        Self {
            fallback: true,
            ..Self::default()
        }
    }
}

/// Per-request state threaded through internal re-entry.
#[derive(Clone, Default)]
pub struct RequestState {
    /// Pattern of the page route whose load issued this request.
    pub initiator: Option<String>,
    /// URL as written by the load that fetched it.
    pub fetched: Option<String>,
    pub prerender: Option<Arc<PrerenderState>>,
}

impl RequestState {
    pub fn prerender(state: Arc<PrerenderState>) -> Self {
        Self {
            prerender: Some(state),
            ..Self::default()
        }
    }
}

/// The response pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Server {
    manifest: Arc<Manifest>,
    engine: LoadEngine,
    hooks: Hooks,
    options: Arc<ServerOptions>,
    renderer: Arc<dyn PageRenderer>,
}

impl Server {
    pub fn new(manifest: Manifest, options: ServerOptions) -> Self {
        let engine = LoadEngine::new(manifest.fallback().clone());
        Self {
            manifest: Arc::new(manifest),
            engine,
            hooks: Hooks::default(),
            options: Arc::new(options),
            renderer: Arc::new(HtmlShell),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub(crate) fn engine(&self) -> &LoadEngine {
        &self.engine
    }

    pub(crate) fn renderer(&self) -> &dyn PageRenderer {
        self.renderer.as_ref()
    }

    /// Handle one request. `None` only for internal requests that no route
    /// served.
    pub async fn respond(
        &self,
        incoming: IncomingRequest,
        state: RequestState,
    ) -> Option<ServerResponse> {
        if let Some(path) = self.options.trailing_slash.correct(&incoming.path) {
            let query = incoming.query.to_string();
            let location = if query.is_empty() {
                format!("{}{}", self.options.base, path)
            } else {
                format!("{}{}?{}", self.options.base, path, query)
            };
            tracing::debug!(from = %incoming.path, to = %location, "Correcting trailing slash");
            return Some(ServerResponse::redirect(301, &location));
        }

        let body = match parse_body(incoming.raw_body.as_ref(), &incoming.headers) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(path = %incoming.path, error = %e, "Rejecting request body");
                return Some(ServerResponse::text(e.status(), e.to_string()));
            }
        };

        let request = ServerRequest {
            origin: incoming.origin,
            method: incoming.method,
            headers: incoming.headers,
            path: incoming.path,
            query: incoming.query,
            raw_body: incoming.raw_body,
            body,
            params: Default::default(),
            locals: Default::default(),
        };
        let report = request.clone();

        let server = self.clone();
        let resolve: Resolve = Box::new(move |request: ServerRequest| {
            async move { server.resolve(request, state).await }.boxed()
        });

        match self.hooks.handle.handle(request, resolve).await {
            Ok(response) => response,
            Err(error) => {
                self.hooks.handle_error.handle_error(&error, &report);
                Some(ServerResponse::text(
                    500,
                    error.public_message(self.options.dev),
                ))
            }
        }
    }

    /// Render `path` as part of a prerender pass.
    pub async fn prerender(
        &self,
        origin: &str,
        path: &str,
        pass: Arc<PrerenderState>,
    ) -> Option<ServerResponse> {
        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        self.respond(
            IncomingRequest::get(origin, path, query),
            RequestState::prerender(pass),
        )
        .await
    }

    async fn resolve(
        &self,
        request: ServerRequest,
        state: RequestState,
    ) -> Result<Option<ServerResponse>> {
        let session = RequestSession::new(&request);
        if state.prerender.as_ref().is_some_and(|p| p.fallback) {
            return page::render_shell(self, &session).await.map(Some);
        }

        let decoded = decode_path(&request.path).into_owned();
        for candidate in self.manifest.candidates(&decoded) {
            let response = match &candidate.route {
                Route::Endpoint(endpoint) => {
                    let mut request = request.clone();
                    request.params = candidate.params.clone();
                    endpoint
                        .handler()
                        .handle(&request)
                        .await?
                        .map(EndpointOutput::into_response)
                }
                Route::Page(route) => {
                    page::render_page(
                        self,
                        &request,
                        route,
                        &candidate.params,
                        &state,
                        &session,
                    )
                    .await?
                }
            };

            if let Some(response) = response {
                return Ok(Some(etag::apply(&request.headers, response)));
            }
        }

        if state.initiator.is_some() {
            return Ok(None);
        }

        tracing::debug!(path = %request.path, "No route served the request");
        let error = Error::NotFound {
            path: request.path.clone(),
        };
        page::respond_with_error(self, &request, 404, error, &state, &session)
            .await
            .map(Some)
    }

    pub(crate) fn load_context(
        &self,
        request: &ServerRequest,
        state: &RequestState,
        session: Arc<Value>,
        initiator: Option<String>,
    ) -> LoadContext {
        let fetch = ServerFetch::new(self.clone(), request, state.clone(), initiator);
        let mut ctx =
            LoadContext::new(request.origin.clone(), Arc::new(fetch)).with_session(session, 0);
        if let Some(prerender) = &state.prerender {
            ctx.prerendering = true;
            ctx = ctx.with_cache(prerender.cache.clone());
        }
        ctx
    }
}
