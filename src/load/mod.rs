//! Load Waterfall Engine
//!
//! Runs a route's segment loads root to leaf and assembles the renderable
//! result, on both the client and the server.
//!
//! # Data Flow
//! ```text
//! NavigationInfo → LoadEngine::navigate
//!     → for each candidate route: ResultCache hit? → return shared result
//!     → for each segment: reuse previous node | run load with tracked input
//!         → stuff merged top-down
//!         → redirect  → stop, return redirect
//!         → error     → nearest error boundary | 2-node fallback branch
//!         → None leaf → fall through to next candidate
//!     → assemble NavigationResult (+ cache entry when leaf max_age > 0)
//! ```
//!
//! # Design Decisions
//! - Fetch transport, session and "what is currently rendered" are handed in
//!   per call through [`LoadContext`]; the engine holds no per-navigation state
//! - Re-run decisions are driven only by recorded reads ([`Uses`])
//! - Results are shared as `Arc<NavigationResult>` so a cache hit returns the
//!   identical instance

pub mod engine;
pub mod fetch;
pub mod input;
pub mod output;
pub mod page;
pub mod tracker;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::routing::{decode_path, ComponentRef, Manifest, RouteMatch};

pub use engine::{is_redirect_loop, LoadContext, LoadEngine};
pub use fetch::{
    Credentials, Fetch, FetchBody, FetchInit, FetchRequest, FetchResponse, NetworkFetch,
    SerializedFetch,
};
pub use input::{load_fn, Load, LoadFn, LoadInput, PageView};
pub use output::{LoadOutput, Loaded, Outcome};
pub use page::{PageContext, Query};
pub use tracker::Uses;

/// Context accumulated top-down across the segments of one navigation.
pub type Stuff = Map<String, Value>;

/// Result of one segment in a rendered branch.
#[derive(Debug, Clone)]
pub struct BranchNode {
    pub component: ComponentRef,
    /// `None` when the component has no load.
    pub loaded: Option<Loaded>,
    /// Stuff pool after this segment contributed to it.
    pub stuff: Stuff,
    pub uses: Uses,
    /// A fetch made by this node forwarded credentials.
    pub credentialed: bool,
    pub fetched: Vec<SerializedFetch>,
    pub set_cookies: Vec<String>,
}

impl BranchNode {
    /// Node for a component without a load.
    pub fn passive(component: ComponentRef, stuff: Stuff) -> Self {
        Self {
            component,
            loaded: None,
            stuff,
            uses: Uses::default(),
            credentialed: false,
            fetched: Vec::new(),
            set_cookies: Vec::new(),
        }
    }
}

pub type Branch = Vec<Arc<BranchNode>>;

/// What is currently rendered. Replaced wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct NavigationState {
    pub page: Option<Arc<PageContext>>,
    pub branch: Branch,
    pub session_id: u64,
}

/// A prospective navigation target.
#[derive(Debug, Clone)]
pub struct NavigationInfo {
    pub id: String,
    /// Raw path as it appears in the URL.
    pub path: String,
    pub decoded_path: String,
    pub query: Query,
    pub routes: Vec<RouteMatch>,
}

impl NavigationInfo {
    /// Match `path` (raw, still percent-encoded) against the manifest's
    /// page routes.
    pub fn resolve(manifest: &Manifest, path: &str, query: &str) -> Self {
        let decoded_path = decode_path(path).into_owned();
        let query = Query::parse(query);
        let id = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };
        Self {
            id,
            path: path.to_string(),
            routes: manifest.page_candidates(&decoded_path),
            decoded_path,
            query,
        }
    }

    /// Cache and single-flight key for this target.
    pub fn cache_key(&self) -> String {
        format!("{}?{}", self.decoded_path, self.query)
    }
}

/// A redirect produced by a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub status: u16,
    pub location: String,
}

/// What the component layer renders: components root to leaf and their props.
#[derive(Debug, Clone)]
pub struct RenderProps {
    pub components: Vec<ComponentRef>,
    pub props: Vec<Value>,
    pub status: u16,
    pub error: Option<Error>,
    /// Only present when path or query changed since the last render.
    pub page: Option<Arc<PageContext>>,
}

impl Default for RenderProps {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            props: Vec::new(),
            status: 200,
            error: None,
            page: None,
        }
    }
}

/// An assembled navigation: either renderable, or a redirect instruction.
#[derive(Debug, Clone, Default)]
pub struct NavigationResult {
    pub redirect: Option<Redirect>,
    pub state: NavigationState,
    pub props: RenderProps,
}

impl NavigationResult {
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            redirect: Some(Redirect {
                status,
                location: location.into(),
            }),
            ..Self::default()
        }
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    pub fn leaf(&self) -> Option<&Arc<BranchNode>> {
        self.state.branch.last()
    }

    /// `max_age` declared by the leaf, if positive.
    pub fn max_age(&self) -> Option<u64> {
        self.leaf()
            .and_then(|node| node.loaded.as_ref())
            .and_then(|loaded| loaded.max_age)
            .filter(|age| *age > 0)
    }

    /// Whether any node read the session or issued a credentialed fetch.
    pub fn is_private(&self) -> bool {
        self.state
            .branch
            .iter()
            .any(|node| node.uses.session || node.credentialed)
    }
}
