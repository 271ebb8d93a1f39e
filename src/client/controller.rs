//! The client navigation state machine.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tokio::sync::watch;
use url::Url;

use crate::cache::{Flight, ResultCache, SingleFlight};
use crate::client::fetch::HydrationFetch;
use crate::client::host::{HistoryState, Host, NavigationEvent, ScrollPosition};
use crate::client::link::{self, ClickEvent, LinkAction};
use crate::client::scroll::{self, ScrollAction, ScrollSample};
use crate::error::{Error, Result};
use crate::load::{
    is_redirect_loop, Fetch, LoadContext, LoadEngine, NavigationInfo, NavigationResult,
    NavigationState, PageContext, Query,
};
use crate::observability::metrics;
use crate::routing::{Manifest, TrailingSlash};
use crate::server::HydrationData;

/// Interceptor run before every navigation. Returning `false` vetoes it.
pub type BeforeNavigate = Arc<dyn Fn(Url) -> BoxFuture<'static, bool> + Send + Sync>;

/// Callback run after a navigation changed the page.
pub type AfterNavigate = Arc<dyn Fn(&PageContext) + Send + Sync>;

/// Handle returned by [`NavigationController::on_before_navigate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Path prefix the app owns, without trailing slash.
    pub base: String,
    pub trailing_slash: TrailingSlash,
    /// Intercept link clicks at all.
    pub router: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base: String::new(),
            trailing_slash: TrailingSlash::default(),
            router: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GotoOptions {
    /// Keep the current scroll offset.
    pub noscroll: bool,
    /// Replace the current history entry instead of pushing one.
    pub replace_state: bool,
    /// Do not reset focus after rendering.
    pub keepfocus: bool,
    /// Application state stored with the history entry.
    pub state: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    /// Number of navigations in flight, including nested redirects.
    Navigating(usize),
    /// Clicks fall back to full browser navigation.
    Disabled,
}

/// Path and query of one end of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Query,
}

/// Value of the `navigating` store while a navigation is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigating {
    pub from: Option<Location>,
    pub to: Location,
}

/// Scroll and focus handling requested for a user navigation.
#[derive(Debug, Clone, Default)]
struct Settle {
    scroll: Option<ScrollPosition>,
    keepfocus: bool,
    hash: Option<String>,
}

struct ControllerState {
    current: Arc<NavigationState>,
    session: Arc<Value>,
    session_id: u64,
    invalid: HashSet<String>,
    token: u64,
    navigating: usize,
    enabled: bool,
    started: bool,
    history_index: u64,
    next_hook: u64,
}

/// Owns client-side routing: link interception, history, the load
/// waterfall for each navigation and applying its result to the host.
pub struct NavigationController {
    host: Arc<dyn Host>,
    manifest: Arc<Manifest>,
    engine: LoadEngine,
    options: ClientOptions,
    fetch: Arc<HydrationFetch>,
    cache: Arc<ResultCache>,
    state: Mutex<ControllerState>,
    loading: SingleFlight<Result<Arc<NavigationResult>>>,
    invalidating: Mutex<Option<Flight<()>>>,
    before_navigate: Mutex<Vec<(HookId, BeforeNavigate)>>,
    after_navigate: Mutex<Vec<AfterNavigate>>,
    page: watch::Sender<Option<Arc<PageContext>>>,
    navigating: watch::Sender<Option<Navigating>>,
}

impl NavigationController {
    pub fn new(
        host: Arc<dyn Host>,
        manifest: Arc<Manifest>,
        options: ClientOptions,
        network: Arc<dyn Fetch>,
    ) -> Arc<Self> {
        let history_index = host.history_state().index;
        let engine = LoadEngine::new(manifest.fallback().clone());
        let enabled = options.router;

        Arc::new(Self {
            host,
            manifest,
            engine,
            options,
            fetch: Arc::new(HydrationFetch::new(network)),
            cache: Arc::new(ResultCache::new()),
            state: Mutex::new(ControllerState {
                current: Arc::new(NavigationState::default()),
                session: Arc::new(Value::Null),
                session_id: 1,
                invalid: HashSet::new(),
                token: 0,
                navigating: 0,
                enabled,
                started: false,
                history_index,
                next_hook: 0,
            }),
            loading: SingleFlight::new(),
            invalidating: Mutex::new(None),
            before_navigate: Mutex::new(Vec::new()),
            after_navigate: Mutex::new(Vec::new()),
            page: watch::Sender::new(None),
            navigating: watch::Sender::new(None),
        })
    }

    fn inner(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> RouterState {
        let inner = self.inner();
        if !inner.enabled {
            RouterState::Disabled
        } else if inner.navigating > 0 {
            RouterState::Navigating(inner.navigating)
        } else {
            RouterState::Idle
        }
    }

    /// What is currently rendered.
    pub fn current(&self) -> Arc<NavigationState> {
        self.inner().current.clone()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// The `page` store: updated whenever path or query changes.
    pub fn page(&self) -> watch::Receiver<Option<Arc<PageContext>>> {
        self.page.subscribe()
    }

    /// The `navigating` store.
    pub fn navigating(&self) -> watch::Receiver<Option<Navigating>> {
        self.navigating.subscribe()
    }

    pub fn on_before_navigate<F, Fut>(&self, hook: F) -> HookId
    where
        F: Fn(Url) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let id = {
            let mut inner = self.inner();
            inner.next_hook += 1;
            HookId(inner.next_hook)
        };
        let hook: BeforeNavigate = Arc::new(move |url: Url| hook(url).boxed());
        self.before_navigate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, hook));
        id
    }

    pub fn remove_before_navigate(&self, id: HookId) {
        self.before_navigate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(hook, _)| *hook != id);
    }

    pub fn on_navigate(&self, callback: impl Fn(&PageContext) + Send + Sync + 'static) {
        self.after_navigate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Whether `url` belongs to this app.
    pub fn owns(&self, url: &Url) -> bool {
        url.origin() == self.host.location().origin() && url.path().starts_with(&self.options.base)
    }

    /// Resolve `url` into a navigation target, if the app owns it.
    pub fn parse(&self, url: &Url) -> Option<NavigationInfo> {
        if !self.owns(url) {
            return None;
        }
        let path = url
            .path()
            .strip_prefix(self.options.base.as_str())
            .filter(|path| !path.is_empty())
            .unwrap_or("/");
        Some(NavigationInfo::resolve(
            &self.manifest,
            path,
            url.query().unwrap_or(""),
        ))
    }

    /// Hydrate the server-rendered page at the host's current location.
    pub async fn start(self: &Arc<Self>, data: HydrationData) -> Result<()> {
        let expected = data.status;
        self.inner().session = Arc::new(data.session);
        self.fetch.prime(data.fetched);

        let location = self.host.location();
        let info = self
            .parse(&location)
            .ok_or_else(|| Error::Unowned(location.to_string()))?;
        let ctx = self.load_context(false);
        let result = self.engine.navigate(&info, &ctx).await?;

        if let Some(redirect) = &result.redirect {
            let target = self.resolve(&redirect.location)?;
            tracing::info!(location = %target, "Redirected during hydration, leaving the app");
            self.host.assign(&target);
            return Ok(());
        }
        if result.props.status != expected {
            tracing::warn!(
                path = %info.path,
                server = expected,
                client = result.props.status,
                "Hydration status differs from the server render"
            );
        }

        self.apply(&result);
        self.host.tick();
        self.set_router(&result);
        tracing::debug!(path = %info.path, "Router started");
        Ok(())
    }

    /// Handle a click. The returned action tells the host whether to
    /// prevent the browser default (`Prevent` and `Follow`).
    pub async fn handle_click(self: &Arc<Self>, event: &ClickEvent) -> Result<LinkAction> {
        if !self.inner().enabled {
            return Ok(LinkAction::Ignore);
        }
        let location = self.host.location();
        let action = link::classify(event, &location, |url| self.owns(url));
        let LinkAction::Follow { url, noscroll } = &action else {
            return Ok(action);
        };

        if !self.allow(url).await {
            return Ok(action);
        }

        let scroll = noscroll.then(|| self.host.scroll());
        let index = {
            let mut inner = self.inner();
            inner.history_index += 1;
            inner.history_index
        };
        self.host.push_state(
            HistoryState {
                index,
                ..HistoryState::default()
            },
            url,
        );
        if link::without_hash(url) == link::without_hash(&location) {
            self.host.dispatch(NavigationEvent::HashChange);
        }

        self.navigate(url.clone(), scroll, false, Vec::new()).await?;
        Ok(action)
    }

    /// Handle a `popstate` event carrying `state`.
    pub async fn handle_popstate(self: &Arc<Self>, state: Option<HistoryState>) -> Result<()> {
        let Some(state) = state else {
            return Ok(());
        };
        if !self.inner().enabled {
            return Ok(());
        }

        let url = self.host.location();
        let delta = self.inner().history_index as i64 - state.index as i64;
        if delta != 0 && !self.allow(&url).await {
            // The browser already moved; move it back.
            self.host.go(delta);
            return Ok(());
        }

        self.inner().history_index = state.index;
        self.navigate(url, state.scroll, false, Vec::new()).await
    }

    /// Navigate to `href`, resolved against the current location.
    pub async fn goto(self: &Arc<Self>, href: &str, opts: GotoOptions) -> Result<()> {
        self.goto_with_chain(href, opts, Vec::new()).await
    }

    async fn goto_with_chain(
        self: &Arc<Self>,
        href: &str,
        opts: GotoOptions,
        chain: Vec<String>,
    ) -> Result<()> {
        let url = self.resolve(href)?;
        if !self.allow(&url).await {
            return Ok(());
        }

        let enabled = self.inner().enabled;
        if !enabled || !self.owns(&url) {
            tracing::debug!(url = %url, "Leaving the app");
            self.host.assign(&url);
            return Ok(());
        }

        let index = {
            let mut inner = self.inner();
            if !opts.replace_state {
                inner.history_index += 1;
            }
            inner.history_index
        };
        let entry = HistoryState {
            index,
            scroll: None,
            data: opts.state,
        };
        if opts.replace_state {
            self.host.replace_state(entry, &url);
        } else {
            self.host.push_state(entry, &url);
        }

        let scroll = opts.noscroll.then(|| self.host.scroll());
        self.navigate(url, scroll, opts.keepfocus, chain).await
    }

    /// Load `url` ahead of navigation. The next navigation to the same
    /// target joins this load instead of starting another.
    pub async fn prefetch(self: &Arc<Self>, url: &Url) -> Result<Arc<NavigationResult>> {
        let info = self
            .parse(url)
            .ok_or_else(|| Error::Unowned(url.to_string()))?;
        self.load(info).await
    }

    /// Start, or join, the load for `info`. Only one target is kept in
    /// flight; loading a different one forgets the previous.
    pub fn load(self: &Arc<Self>, info: NavigationInfo) -> Flight<Result<Arc<NavigationResult>>> {
        if let Some(flight) = self.loading.get(&info.id) {
            return flight;
        }
        self.loading.clear();

        let id = info.id.clone();
        let this = self.clone();
        self.loading.run(&id, move || async move {
            let ctx = this.load_context(false);
            this.engine.navigate(&info, &ctx).await
        })
    }

    /// Mark `href` stale and re-run the current route. Calls made before
    /// the re-run starts share it.
    pub fn invalidate(self: &Arc<Self>, href: &str) -> Flight<()> {
        // Dependencies are recorded as absolute hrefs.
        let href = match self.resolve(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!(
                    href = %href,
                    error = %e,
                    "Invalidating unresolvable href as written"
                );
                href.to_string()
            }
        };
        self.inner().invalid.insert(href);

        let mut invalidating = self
            .invalidating
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(flight) = invalidating.as_ref() {
            return flight.clone();
        }

        let this = self.clone();
        let flight = async move {
            tokio::task::yield_now().await;
            let location = this.host.location();
            if let Some(info) = this.parse(&location) {
                if let Err(e) = this.update(info, Vec::new(), true, None).await {
                    tracing::error!(url = %location, error = %e, "Invalidation failed");
                }
            }
            *this
                .invalidating
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = None;
        }
        .boxed()
        .shared();

        *invalidating = Some(flight.clone());
        tokio::spawn(flight.clone());
        flight
    }

    /// Replace the session. Cached results from older sessions are dropped
    /// and, once started, the current route re-runs loads that read it.
    pub async fn set_session(self: &Arc<Self>, session: Value) -> Result<()> {
        let (session_id, started) = {
            let mut inner = self.inner();
            inner.session = Arc::new(session);
            inner.session_id += 1;
            (inner.session_id, inner.started)
        };
        self.cache.invalidate_session(session_id);
        if !started {
            return Ok(());
        }

        let Some(info) = self.parse(&self.host.location()) else {
            return Ok(());
        };
        self.update(info, Vec::new(), true, None).await
    }

    /// Store the current scroll offset in the current history entry.
    pub fn record_scroll(&self) {
        let mut entry = self.host.history_state();
        entry.scroll = Some(self.host.scroll());
        self.host.replace_state(entry, &self.host.location());
    }

    fn navigate<'a>(
        self: &'a Arc<Self>,
        url: Url,
        scroll: Option<ScrollPosition>,
        keepfocus: bool,
        chain: Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut info = self
                .parse(&url)
                .ok_or_else(|| Error::Unowned(url.to_string()))?;

            let first = {
                let mut inner = self.inner();
                inner.navigating += 1;
                inner.navigating == 1
            };
            if first {
                tracing::debug!(path = %info.path, "Navigation started");
                self.host.dispatch(NavigationEvent::Start);
            }

            if let Some(path) = self.options.trailing_slash.correct(&info.path) {
                let mut fixed = url.clone();
                fixed.set_path(&format!("{}{}", self.options.base, path));
                self.host.replace_state(self.host.history_state(), &fixed);
                let query = url.query().unwrap_or("");
                info = NavigationInfo::resolve(&self.manifest, &path, query);
            }

            let settle = Settle {
                scroll,
                keepfocus,
                hash: url.fragment().map(str::to_string),
            };
            let outcome = self.handle_navigation(info, chain, false, Some(settle)).await;

            let last = {
                let mut inner = self.inner();
                inner.navigating -= 1;
                inner.navigating == 0
            };
            if last {
                tracing::debug!(url = %url, "Navigation finished");
                self.host.dispatch(NavigationEvent::End);
            }
            outcome
        }
        .boxed()
    }

    async fn handle_navigation(
        self: &Arc<Self>,
        info: NavigationInfo,
        chain: Vec<String>,
        no_cache: bool,
        settle: Option<Settle>,
    ) -> Result<()> {
        let navigating = {
            let inner = self.inner();
            inner.started.then(|| Navigating {
                from: inner.current.page.as_ref().map(|page| Location {
                    path: page.path.clone(),
                    query: page.query.clone(),
                }),
                to: Location {
                    path: info.path.clone(),
                    query: info.query.clone(),
                },
            })
        };
        if navigating.is_some() {
            self.navigating.send_replace(navigating);
        }
        self.update(info, chain, no_cache, settle).await
    }

    async fn update(
        self: &Arc<Self>,
        info: NavigationInfo,
        chain: Vec<String>,
        no_cache: bool,
        settle: Option<Settle>,
    ) -> Result<()> {
        let token = {
            let mut inner = self.inner();
            inner.token += 1;
            inner.token
        };

        let mut result = self.navigation_result(&info, no_cache).await?;

        if self.inner().token != token {
            tracing::debug!(path = %info.path, "Navigation superseded");
            metrics::record_navigation("superseded");
            return Ok(());
        }
        self.inner().invalid.clear();

        if let Some(redirect) = result.redirect.clone() {
            if is_redirect_loop(&chain, &info.path) {
                tracing::warn!(path = %info.path, chain = ?chain, "Redirect loop");
                metrics::record_navigation("redirect_loop");
                let ctx = self.load_context(no_cache);
                result = self
                    .engine
                    .load_error(500, Error::RedirectLoop, &info, &ctx)
                    .await?;
            } else {
                metrics::record_navigation("redirect");
                let mut chain = chain;
                chain.push(info.path.clone());
                let opts = GotoOptions {
                    replace_state: true,
                    ..GotoOptions::default()
                };
                return self.goto_with_chain(&redirect.location, opts, chain).await;
            }
        }

        self.apply(&result);
        metrics::record_navigation("complete");

        match settle {
            Some(settle) => self.settle(settle).await,
            None => {
                tokio::task::yield_now().await;
                self.host.tick();
            }
        }

        self.loading.clear();
        self.set_router(&result);
        Ok(())
    }

    async fn navigation_result(
        &self,
        info: &NavigationInfo,
        no_cache: bool,
    ) -> Result<Arc<NavigationResult>> {
        if let Some(flight) = self.loading.get(&info.id) {
            return flight.await;
        }
        let ctx = self.load_context(no_cache);
        self.engine.navigate(info, &ctx).await
    }

    fn apply(&self, result: &NavigationResult) {
        let hydrate = {
            let mut inner = self.inner();
            inner.current = Arc::new(result.state.clone());
            let hydrate = !inner.started;
            inner.started = true;
            hydrate
        };

        self.host.render(&result.props, hydrate);
        if hydrate {
            self.fetch.finish();
        }
        self.navigating.send_replace(None);

        if let Some(page) = &result.props.page {
            self.page.send_replace(Some(page.clone()));
            let callbacks = self
                .after_navigate
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for callback in callbacks {
                callback(page);
            }
        }
    }

    async fn settle(&self, settle: Settle) {
        if !settle.keepfocus {
            self.host.reset_focus();
        }

        let before = self.sample();
        tokio::task::yield_now().await;
        self.host.tick();
        let after = self.sample();

        match scroll::decide(before, after, settle.scroll, settle.hash.as_deref()) {
            ScrollAction::Keep => {}
            ScrollAction::To(position) => self.host.scroll_to(position),
            ScrollAction::IntoView(id) => {
                if !self.host.scroll_into_view(&id) {
                    self.host.scroll_to(ScrollPosition::TOP);
                }
            }
            ScrollAction::Top => self.host.scroll_to(ScrollPosition::TOP),
        }
    }

    fn sample(&self) -> ScrollSample {
        ScrollSample {
            y: self.host.scroll().y,
            max_y: self.host.max_scroll_y(),
        }
    }

    fn set_router(&self, result: &NavigationResult) {
        let leaf_allows = result.leaf().map_or(true, |node| node.component.router());
        let enabled = self.options.router && leaf_allows;
        let mut inner = self.inner();
        if inner.enabled != enabled {
            tracing::debug!(enabled, "Client router toggled by leaf");
        }
        inner.enabled = enabled;
    }

    async fn allow(&self, url: &Url) -> bool {
        let hooks: Vec<BeforeNavigate> = self
            .before_navigate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        if hooks.is_empty() {
            return true;
        }

        let verdicts = join_all(hooks.iter().map(|hook| hook(url.clone()))).await;
        let allowed = verdicts.into_iter().all(|ok| ok);
        if !allowed {
            tracing::debug!(url = %url, "Navigation vetoed");
            metrics::record_navigation("vetoed");
        }
        allowed
    }

    fn resolve(&self, href: &str) -> Result<Url> {
        self.host
            .location()
            .join(href)
            .map_err(|e| Error::Fatal(format!("invalid URL {href}: {e}")))
    }

    fn load_context(&self, no_cache: bool) -> LoadContext {
        let inner = self.inner();
        let origin = self.host.location().origin().ascii_serialization();
        let mut ctx = LoadContext::new(origin, self.fetch.clone())
            .with_current(inner.current.clone())
            .with_session(inner.session.clone(), inner.session_id)
            .with_cache(self.cache.clone());
        ctx.invalid = Arc::new(inner.invalid.clone());
        ctx.no_cache = no_cache;
        ctx
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::HeaderMap;
    use serde_json::json;

    use super::*;
    use crate::client::host::MemoryHost;
    use crate::client::link::Anchor;
    use crate::load::{load_fn, FetchRequest, FetchResponse, LoadOutput};
    use crate::routing::{Component, Fallback};

    struct Offline;

    #[async_trait]
    impl Fetch for Offline {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            Ok(FetchResponse::new(200, HeaderMap::new(), request.href.to_string()))
        }
    }

    fn manifest(runs: Arc<AtomicUsize>) -> Manifest {
        let fallback = Fallback {
            layout: Component::new("root").into_ref(),
            error: Component::new("error").into_ref(),
        };
        let layout = Component::new("layout").into_ref();
        let post = Component::new("post")
            .with_load(load_fn(move |input| {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    let slug = input.page().param("slug").unwrap_or_default().to_string();
                    Ok(Some(LoadOutput::props(json!({ "slug": slug }))))
                }
            }))
            .into_ref();
        let home = Component::new("home").into_ref();
        let locked = Component::new("locked").without_router().into_ref();

        Manifest::new(fallback)
            .page("/", vec![layout.clone(), home])
            .and_then(|m| m.page("/blog/[slug]", vec![layout.clone(), post]))
            .and_then(|m| m.page("/locked", vec![layout, locked]))
            .unwrap()
    }

    async fn started() -> (Arc<NavigationController>, Arc<MemoryHost>, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let host = Arc::new(MemoryHost::new(Url::parse("https://example.com/").unwrap()));
        let controller = NavigationController::new(
            host.clone(),
            Arc::new(manifest(runs.clone())),
            ClientOptions::default(),
            Arc::new(Offline),
        );
        controller
            .start(HydrationData {
                status: 200,
                ..HydrationData::default()
            })
            .await
            .unwrap();
        (controller, host, runs)
    }

    #[tokio::test]
    async fn test_start_hydrates_current_location() {
        let (controller, host, _) = started().await;
        let rendered = host.renders();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].components, vec!["layout", "home"]);
        assert!(rendered[0].hydrate);
        assert_eq!(rendered[0].status, 200);
        assert_eq!(controller.state(), RouterState::Idle);
        assert_eq!(controller.page().borrow().as_ref().unwrap().path, "/");
    }

    #[tokio::test]
    async fn test_click_pushes_history_and_fires_edges_once() {
        let (controller, host, runs) = started().await;

        let action = controller
            .handle_click(&ClickEvent::on(Anchor::to("/blog/hello")))
            .await
            .unwrap();
        assert!(matches!(action, LinkAction::Follow { .. }));
        assert_eq!(host.location().path(), "/blog/hello");
        assert_eq!(host.history_state().index, 1);
        assert_eq!(
            host.events(),
            vec![NavigationEvent::Start, NavigationEvent::End]
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(controller.state(), RouterState::Idle);
        assert!(controller.navigating().borrow().is_none());
    }

    #[tokio::test]
    async fn test_veto_blocks_click_navigation() {
        let (controller, host, _) = started().await;
        controller.on_before_navigate(|_| async { false });

        controller
            .handle_click(&ClickEvent::on(Anchor::to("/blog/hello")))
            .await
            .unwrap();
        assert_eq!(host.location().path(), "/");
        assert_eq!(host.history_len(), 1);
    }

    #[tokio::test]
    async fn test_vetoed_popstate_restores_history() {
        let (controller, host, _) = started().await;
        controller.goto("/blog/a", GotoOptions::default()).await.unwrap();
        let id = controller.on_before_navigate(|_| async { false });

        let state = host.traverse(-1);
        controller.handle_popstate(state).await.unwrap();
        assert_eq!(host.location().path(), "/blog/a");

        controller.remove_before_navigate(id);
        let state = host.traverse(-1);
        controller.handle_popstate(state).await.unwrap();
        assert_eq!(controller.current().page.as_ref().unwrap().path, "/");
    }

    #[tokio::test]
    async fn test_leaf_without_router_disables_clicks() {
        let (controller, host, _) = started().await;
        controller.goto("/locked", GotoOptions::default()).await.unwrap();
        assert_eq!(controller.state(), RouterState::Disabled);

        let action = controller
            .handle_click(&ClickEvent::on(Anchor::to("/")))
            .await
            .unwrap();
        assert_eq!(action, LinkAction::Ignore);

        controller.goto("/", GotoOptions::default()).await.unwrap();
        assert_eq!(host.assigned().len(), 1);
    }

    #[tokio::test]
    async fn test_goto_outside_base_is_full_navigation() {
        let (controller, host, _) = started().await;
        controller
            .goto("https://other.org/x", GotoOptions::default())
            .await
            .unwrap();
        assert_eq!(
            host.assigned(),
            vec![Url::parse("https://other.org/x").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_prefetch_is_joined_by_navigation() {
        let (controller, _, runs) = started().await;
        let url = Url::parse("https://example.com/blog/pre").unwrap();

        let prefetched = controller.prefetch(&url).await.unwrap();
        controller.goto("/blog/pre", GotoOptions::default()).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(
            &prefetched.state.branch[1],
            &controller.current().branch[1]
        ));
    }

    #[tokio::test]
    async fn test_prefetch_rejects_unowned_url() {
        let (controller, _, _) = started().await;
        let url = Url::parse("https://other.org/blog/x").unwrap();
        assert!(matches!(
            controller.prefetch(&url).await,
            Err(Error::Unowned(_))
        ));
    }

    #[tokio::test]
    async fn test_scroll_resets_to_top_unless_noscroll() {
        let (controller, host, _) = started().await;
        host.set_scroll(ScrollPosition::new(0, 400));
        controller.goto("/blog/a", GotoOptions::default()).await.unwrap();
        assert_eq!(host.scroll(), ScrollPosition::TOP);
        assert_eq!(host.focus_resets(), 1);

        host.set_scroll(ScrollPosition::new(0, 250));
        let opts = GotoOptions {
            noscroll: true,
            keepfocus: true,
            ..GotoOptions::default()
        };
        controller.goto("/blog/b", opts).await.unwrap();
        assert_eq!(host.scroll(), ScrollPosition::new(0, 250));
        assert_eq!(host.focus_resets(), 1);
    }

    #[tokio::test]
    async fn test_mount_scroll_is_left_alone() {
        let (controller, host, _) = started().await;
        host.set_scroll(ScrollPosition::new(0, 400));
        host.scroll_on_mount(Some(ScrollPosition::new(0, 123)));
        controller.goto("/blog/a", GotoOptions::default()).await.unwrap();
        assert_eq!(host.scroll(), ScrollPosition::new(0, 123));
    }

    #[tokio::test]
    async fn test_session_change_reruns_and_drops_cache() {
        let (controller, _, runs) = started().await;
        controller.goto("/blog/a", GotoOptions::default()).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // The post load never reads the session.
        controller.set_session(json!({"user": 1})).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(controller.cache().is_empty());
    }
}
