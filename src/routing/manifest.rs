//! Resolved route manifest.
//!
//! The build pipeline produces the manifest; at runtime it is only read.
//! Component identity is pointer identity of the shared [`ComponentRef`],
//! which is what the load engine compares when deciding whether a
//! previously rendered node can be reused.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;

use crate::error::Result;
use crate::load::Load;
use crate::routing::matcher::RoutePattern;
use crate::routing::router::RouteMatch;
use crate::server::Endpoint;

/// Shared handle to a component. Two handles refer to the same component
/// only if they point at the same allocation.
pub type ComponentRef = Arc<Component>;

/// A renderable component together with its optional load contract.
pub struct Component {
    name: String,
    load: Option<Arc<dyn Load>>,
    router: bool,
}

impl Component {
    /// A component without a load contract that participates in client routing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            load: None,
            router: true,
        }
    }

    /// Attach a load contract.
    pub fn with_load(mut self, load: impl Load + 'static) -> Self {
        self.load = Some(Arc::new(load));
        self
    }

    /// Opt this component out of client-side routing. When it renders as
    /// the leaf, link clicks fall back to full browser navigation.
    pub fn without_router(mut self) -> Self {
        self.router = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load(&self) -> Option<&Arc<dyn Load>> {
        self.load.as_ref()
    }

    pub fn has_load(&self) -> bool {
        self.load.is_some()
    }

    /// Whether client-side routing stays enabled while this is the leaf.
    pub fn router(&self) -> bool {
        self.router
    }

    pub fn into_ref(self) -> ComponentRef {
        Arc::new(self)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("has_load", &self.load.is_some())
            .field("router", &self.router)
            .finish()
    }
}

/// A page route: the segment chain from root layout to leaf page, plus a
/// parallel chain of optional error boundaries.
///
/// `error_boundaries[k]` renders inside segment `k` when something below
/// it fails.
#[derive(Debug)]
pub struct PageRoute {
    pattern: RoutePattern,
    segments: Vec<ComponentRef>,
    error_boundaries: Vec<Option<ComponentRef>>,
}

impl PageRoute {
    pub fn new(pattern: RoutePattern, segments: Vec<ComponentRef>) -> Self {
        let error_boundaries = vec![None; segments.len()];
        Self {
            pattern,
            segments,
            error_boundaries,
        }
    }

    /// Install an error boundary inside the segment at `depth`.
    pub fn with_error_boundary(mut self, depth: usize, boundary: ComponentRef) -> Self {
        if depth < self.error_boundaries.len() {
            self.error_boundaries[depth] = Some(boundary);
        } else {
            tracing::warn!(
                pattern = %self.pattern.source(),
                depth,
                "Ignoring error boundary deeper than the segment chain"
            );
        }
        self
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn segments(&self) -> &[ComponentRef] {
        &self.segments
    }

    pub fn error_boundary(&self, depth: usize) -> Option<&ComponentRef> {
        self.error_boundaries.get(depth).and_then(Option::as_ref)
    }

    pub fn leaf(&self) -> Option<&ComponentRef> {
        self.segments.last()
    }
}

/// A server-only endpoint route.
pub struct EndpointRoute {
    pattern: RoutePattern,
    handler: Arc<dyn Endpoint>,
}

impl EndpointRoute {
    pub fn new(pattern: RoutePattern, handler: Arc<dyn Endpoint>) -> Self {
        Self { pattern, handler }
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn Endpoint> {
        &self.handler
    }
}

impl fmt::Debug for EndpointRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRoute")
            .field("pattern", &self.pattern.source())
            .finish()
    }
}

/// A manifest entry.
#[derive(Debug, Clone)]
pub enum Route {
    Page(Arc<PageRoute>),
    Endpoint(Arc<EndpointRoute>),
}

impl Route {
    pub fn pattern(&self) -> &RoutePattern {
        match self {
            Route::Page(page) => page.pattern(),
            Route::Endpoint(endpoint) => endpoint.pattern(),
        }
    }

    pub fn as_page(&self) -> Option<&Arc<PageRoute>> {
        match self {
            Route::Page(page) => Some(page),
            Route::Endpoint(_) => None,
        }
    }
}

/// The generic top-level layout and the leaf error component used when no
/// error boundary in a route's chain recovers a failure.
#[derive(Debug, Clone)]
pub struct Fallback {
    pub layout: ComponentRef,
    pub error: ComponentRef,
}

/// A static asset served directly to server-side fetches.
#[derive(Debug, Clone)]
pub struct Asset {
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// The resolved manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    routes: Vec<Route>,
    fallback: Fallback,
    assets: HashMap<String, Asset>,
}

impl Manifest {
    pub fn new(fallback: Fallback) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
            assets: HashMap::new(),
        }
    }

    /// Append a page route.
    pub fn page(mut self, pattern: &str, segments: Vec<ComponentRef>) -> Result<Self> {
        let route = PageRoute::new(RoutePattern::compile(pattern)?, segments);
        self.routes.push(Route::Page(Arc::new(route)));
        Ok(self)
    }

    /// Append a page route built by the caller (e.g. with error boundaries).
    pub fn page_route(mut self, route: PageRoute) -> Self {
        self.routes.push(Route::Page(Arc::new(route)));
        self
    }

    /// Append an endpoint route.
    pub fn endpoint(mut self, pattern: &str, handler: impl Endpoint + 'static) -> Result<Self> {
        let route = EndpointRoute::new(RoutePattern::compile(pattern)?, Arc::new(handler));
        self.routes.push(Route::Endpoint(Arc::new(route)));
        Ok(self)
    }

    /// Register a static asset under its path relative to the assets root.
    pub fn asset(mut self, file: impl Into<String>, asset: Asset) -> Self {
        self.assets.insert(file.into(), asset);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    pub fn asset_for(&self, file: &str) -> Option<&Asset> {
        self.assets.get(file)
    }

    /// All routes matching `decoded_path`, in declaration order.
    pub fn candidates(&self, decoded_path: &str) -> Vec<RouteMatch> {
        crate::routing::router::candidates(&self.routes, decoded_path)
    }

    /// Page routes matching `decoded_path`, in declaration order. Endpoints
    /// are server-only and never part of a client navigation.
    pub fn page_candidates(&self, decoded_path: &str) -> Vec<RouteMatch> {
        self.candidates(decoded_path)
            .into_iter()
            .filter(|m| matches!(m.route, Route::Page(_)))
            .collect()
    }
}
