//! The waterfall itself.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::ResultCache;
use crate::error::{Error, Result};
use crate::load::fetch::Fetch;
use crate::load::input::LoadInput;
use crate::load::output::{Loaded, Outcome};
use crate::load::page::PageContext;
use crate::load::tracker::Trace;
use crate::load::{
    Branch, BranchNode, NavigationInfo, NavigationResult, NavigationState, RenderProps, Stuff,
};
use crate::observability::metrics;
use crate::routing::{ComponentRef, Fallback, PageRoute, Params};

/// Maximum number of redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

/// Whether following a redirect away from `path` would loop, given the
/// paths already visited in this redirect chain.
pub fn is_redirect_loop(chain: &[String], path: &str) -> bool {
    chain.len() > MAX_REDIRECTS || chain.iter().any(|visited| visited == path)
}

/// Per-call capabilities and state for one run of the engine.
#[derive(Clone)]
pub struct LoadContext {
    pub origin: String,
    /// What is currently rendered. Empty on the server and before the first
    /// client render, in which case every segment runs.
    pub current: Arc<NavigationState>,
    pub session: Arc<Value>,
    pub session_id: u64,
    /// Dependency hrefs invalidated since the last render.
    pub invalid: Arc<HashSet<String>>,
    /// Skip the result cache lookup.
    pub no_cache: bool,
    pub fetch: Arc<dyn Fetch>,
    pub cache: Option<Arc<ResultCache>>,
    pub prerendering: bool,
}

impl LoadContext {
    pub fn new(origin: impl Into<String>, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            origin: origin.into(),
            current: Arc::new(NavigationState::default()),
            session: Arc::new(Value::Null),
            session_id: 0,
            invalid: Arc::new(HashSet::new()),
            no_cache: false,
            fetch,
            cache: None,
            prerendering: false,
        }
    }

    pub fn with_current(mut self, current: Arc<NavigationState>) -> Self {
        self.current = current;
        self
    }

    pub fn with_session(mut self, session: Arc<Value>, session_id: u64) -> Self {
        self.session = session;
        self.session_id = session_id;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

/// Inputs that differ from what is currently rendered.
#[derive(Debug, Default)]
struct Changed {
    path: bool,
    query: bool,
    session: bool,
    params: Vec<String>,
}

impl Changed {
    /// `None` on the first navigation: everything counts as changed.
    fn between(current: &NavigationState, page: &PageContext, session_id: u64) -> Option<Self> {
        let previous = current.page.as_ref()?;
        Some(Self {
            path: previous.path != page.path,
            query: previous.query != page.query,
            session: current.session_id != session_id,
            params: page
                .params
                .iter()
                .filter(|(name, value)| previous.params.get(*name) != Some(*value))
                .map(|(name, _)| name.clone())
                .collect(),
        })
    }
}

fn must_rerun(
    previous: Option<&Arc<BranchNode>>,
    component: &ComponentRef,
    changed: Option<&Changed>,
    invalid: &HashSet<String>,
    stuff_changed: bool,
) -> bool {
    let (Some(previous), Some(changed)) = (previous, changed) else {
        return true;
    };
    let uses = &previous.uses;

    !Arc::ptr_eq(&previous.component, component)
        || (changed.path && uses.path)
        || changed.params.iter().any(|name| uses.params.contains(name))
        || (changed.query && uses.query)
        || (changed.session && uses.session)
        || uses.dependencies.iter().any(|dep| invalid.contains(dep))
        || (stuff_changed && uses.stuff)
}

fn merged(base: &Stuff, extra: Option<&Stuff>) -> Stuff {
    let mut pool = base.clone();
    if let Some(extra) = extra {
        pool.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    pool
}

/// Executes segment loads and assembles navigation results.
#[derive(Debug, Clone)]
pub struct LoadEngine {
    fallback: Fallback,
}

impl LoadEngine {
    pub fn new(fallback: Fallback) -> Self {
        Self { fallback }
    }

    /// Try each candidate page route in order; render 404 if all fall
    /// through or none matched.
    pub async fn navigate(
        &self,
        info: &NavigationInfo,
        ctx: &LoadContext,
    ) -> Result<Arc<NavigationResult>> {
        for candidate in &info.routes {
            let Some(route) = candidate.route.as_page() else {
                continue;
            };
            if let Some(result) = self.load_route(route, &candidate.params, info, ctx).await? {
                return Ok(result);
            }
        }

        tracing::debug!(path = %info.path, "No route rendered the path");
        self.load_error(
            404,
            Error::NotFound {
                path: info.path.clone(),
            },
            info,
            ctx,
        )
        .await
    }

    /// Run one candidate route. `Ok(None)` means its leaf fell through.
    pub async fn load_route(
        &self,
        route: &PageRoute,
        params: &Params,
        info: &NavigationInfo,
        ctx: &LoadContext,
    ) -> Result<Option<Arc<NavigationResult>>> {
        let key = info.cache_key();
        if let Some(cache) = ctx.cache.as_ref().filter(|_| !ctx.no_cache) {
            if let Some(hit) = cache.get(&key, ctx.session_id) {
                tracing::debug!(key = %key, "Serving navigation from result cache");
                return Ok(Some(hit));
            }
        }

        let page = Arc::new(PageContext {
            origin: ctx.origin.clone(),
            path: info.decoded_path.clone(),
            query: info.query.clone(),
            params: params.clone(),
        });
        let changed = Changed::between(&ctx.current, &page, ctx.session_id);
        let segments = route.segments();

        let mut branch: Branch = Vec::with_capacity(segments.len());
        let mut stuff = Stuff::new();
        let mut stuff_changed = false;
        let mut failure = None;

        for (i, component) in segments.iter().enumerate() {
            let is_leaf = i + 1 == segments.len();
            let previous = ctx.current.branch.get(i);

            let rerun = must_rerun(
                previous,
                component,
                changed.as_ref(),
                &ctx.invalid,
                stuff_changed,
            );
            let node = if rerun {
                let Some(node) = self.load_node(component, &page, &stuff, None, ctx).await else {
                    if is_leaf {
                        tracing::debug!(
                            pattern = %route.pattern().source(),
                            path = %info.path,
                            "Leaf load returned nothing, falling through"
                        );
                        metrics::record_load("fallthrough");
                        return Ok(None);
                    }
                    failure = Some((
                        500,
                        Error::load(500, "load must return a value except for page fall through"),
                    ));
                    break;
                };

                match node.loaded.as_ref().map(|loaded| &loaded.outcome) {
                    Some(Outcome::Redirect { status, location }) => {
                        tracing::debug!(path = %info.path, location = %location, "Load redirected");
                        return Ok(Some(Arc::new(NavigationResult::redirect(
                            *status,
                            location.clone(),
                        ))));
                    }
                    Some(Outcome::Failed { status, error }) => {
                        failure = Some((*status, error.clone()));
                        break;
                    }
                    Some(Outcome::Ready) => {
                        if node.loaded.as_ref().is_some_and(|l| l.stuff.is_some()) {
                            stuff_changed = true;
                        }
                    }
                    None => {}
                }
                Arc::new(node)
            } else {
                // Reused verbatim, but its stuff pool is rebuilt on top of
                // this navigation's ancestors.
                let Some(previous) = previous else {
                    continue;
                };
                metrics::record_load("reuse");
                let pool = merged(&stuff, previous.loaded.as_ref().and_then(|l| l.stuff.as_ref()));
                if pool == previous.stuff {
                    previous.clone()
                } else {
                    Arc::new(BranchNode {
                        stuff: pool,
                        ..(**previous).clone()
                    })
                }
            };

            stuff = node.stuff.clone();
            branch.push(node);
        }

        let Some((status, error)) = failure else {
            let result = self.assemble(page, branch, 200, None, ctx);
            if let (Some(cache), Some(max_age)) = (&ctx.cache, result.max_age()) {
                cache.insert(key, result.clone(), max_age, ctx.session_id);
            }
            return Ok(Some(result));
        };

        // Nearest boundary above the failing segment; boundary k renders
        // inside segment k.
        for depth in (0..branch.len()).rev() {
            let Some(boundary) = route.error_boundary(depth) else {
                continue;
            };
            let boundary_stuff = branch[depth].stuff.clone();
            let recovered = self
                .load_node(
                    boundary,
                    &page,
                    &boundary_stuff,
                    Some((status, error.clone())),
                    ctx,
                )
                .await
                .filter(|node| node.loaded.as_ref().map_or(true, Loaded::is_ready));

            if let Some(node) = recovered {
                tracing::info!(
                    path = %info.path,
                    status,
                    depth,
                    boundary = %boundary.name(),
                    "Error recovered by boundary"
                );
                branch.truncate(depth + 1);
                branch.push(Arc::new(node));
                return Ok(Some(self.assemble(page, branch, status, Some(error), ctx)));
            }
        }

        tracing::warn!(
            path = %info.path,
            status,
            error = %error,
            "No error boundary recovered, rendering fallback"
        );
        self.load_error(status, error, info, ctx).await.map(Some)
    }

    /// Render the fixed 2-node fallback branch (top-level layout + error).
    pub async fn load_error(
        &self,
        status: u16,
        error: Error,
        info: &NavigationInfo,
        ctx: &LoadContext,
    ) -> Result<Arc<NavigationResult>> {
        metrics::record_load("error");
        let page = Arc::new(PageContext {
            origin: ctx.origin.clone(),
            path: info.decoded_path.clone(),
            query: info.query.clone(),
            params: Params::new(),
        });

        let layout = self
            .load_node(&self.fallback.layout, &page, &Stuff::new(), None, ctx)
            .await
            .ok_or_else(|| Error::Fatal("fallback layout load must return a value".into()))?;
        let error_node = self
            .load_node(
                &self.fallback.error,
                &page,
                &layout.stuff,
                Some((status, error.clone())),
                ctx,
            )
            .await
            .ok_or_else(|| Error::Fatal("fallback error load must return a value".into()))?;

        Ok(self.assemble(
            page,
            vec![Arc::new(layout), Arc::new(error_node)],
            status,
            Some(error),
            ctx,
        ))
    }

    /// Run a single component's load. `None` when the load returned
    /// nothing; components without a load always yield a node.
    async fn load_node(
        &self,
        component: &ComponentRef,
        page: &Arc<PageContext>,
        stuff: &Stuff,
        failure: Option<(u16, Error)>,
        ctx: &LoadContext,
    ) -> Option<BranchNode> {
        let Some(load) = component.load() else {
            return Some(BranchNode::passive(component.clone(), stuff.clone()));
        };

        let trace = Arc::new(Trace::default());
        let input = LoadInput {
            page: page.clone(),
            session: ctx.session.clone(),
            stuff: stuff.clone(),
            fetch: ctx.fetch.clone(),
            failure,
            trace: trace.clone(),
        };

        let output = load.load(input).await;
        metrics::record_load("run");
        let record = trace.snapshot();

        let mut loaded = match output {
            Ok(Some(output)) => Loaded::normalize(output),
            Ok(None) => return None,
            Err(error) => {
                tracing::debug!(component = %component.name(), error = %error, "Load failed");
                Loaded::failed(error)
            }
        };
        if ctx.prerendering && record.uses.query {
            loaded = Loaded::failed(Error::load(
                500,
                "Cannot access query on a page with prerendering enabled",
            ));
        }

        let stuff = match (&loaded.outcome, &loaded.stuff) {
            (Outcome::Ready, Some(extra)) => merged(stuff, Some(extra)),
            _ => stuff.clone(),
        };

        Some(BranchNode {
            component: component.clone(),
            loaded: Some(loaded),
            stuff,
            uses: record.uses,
            credentialed: record.credentialed,
            fetched: record.fetched,
            set_cookies: record.set_cookies,
        })
    }

    fn assemble(
        &self,
        page: Arc<PageContext>,
        branch: Branch,
        status: u16,
        error: Option<Error>,
        ctx: &LoadContext,
    ) -> Arc<NavigationResult> {
        let page_changed = ctx
            .current
            .page
            .as_ref()
            .map_or(true, |current| current.path != page.path || current.query != page.query);

        let props = RenderProps {
            components: branch.iter().map(|node| node.component.clone()).collect(),
            props: branch
                .iter()
                .map(|node| {
                    node.loaded
                        .as_ref()
                        .map_or(Value::Null, |loaded| loaded.props.clone())
                })
                .collect(),
            status,
            error,
            page: page_changed.then(|| page.clone()),
        };

        Arc::new(NavigationResult {
            redirect: None,
            state: NavigationState {
                page: Some(page),
                branch,
                session_id: ctx.session_id,
            },
            props,
        })
    }
}
