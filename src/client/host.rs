//! The browser as the controller sees it.
//!
//! History, scroll position, focus and the rendered tree are owned by the
//! host and reached only through [`Host`], so the controller runs the same
//! way in a browser binding and in tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::load::RenderProps;

/// A scroll offset in whole pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: i64,
    pub y: i64,
}

impl ScrollPosition {
    pub const TOP: ScrollPosition = ScrollPosition { x: 0, y: 0 };

    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// State stored with each history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    /// Monotonic index of the entry, used to compute popstate deltas.
    pub index: u64,
    /// Last known scroll offset of the entry.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scroll: Option<ScrollPosition>,
    /// Application state passed to `goto`.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Lifecycle notifications dispatched to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// The navigation counter went from 0 to 1.
    Start,
    /// The navigation counter returned to 0.
    End,
    /// A link changed only the hash of the current document.
    HashChange,
}

/// Browser capabilities used by the navigation controller.
pub trait Host: Send + Sync {
    fn location(&self) -> Url;
    fn history_state(&self) -> HistoryState;
    fn push_state(&self, state: HistoryState, url: &Url);
    fn replace_state(&self, state: HistoryState, url: &Url);
    /// Move through history by `delta` entries, like `history.go`.
    fn go(&self, delta: i64);

    fn scroll(&self) -> ScrollPosition;
    /// Largest vertical offset the current document can scroll to.
    fn max_scroll_y(&self) -> i64;
    fn scroll_to(&self, position: ScrollPosition);
    /// Scroll the element with `id` into view. `false` if there is none.
    fn scroll_into_view(&self, id: &str) -> bool;
    fn reset_focus(&self);

    /// Mount (`hydrate = true`) or update the component tree.
    fn render(&self, props: &RenderProps, hydrate: bool);
    /// Run work the last render scheduled, such as mount callbacks.
    fn tick(&self) {}
    /// Full browser navigation to `url`.
    fn assign(&self, url: &Url);
    fn dispatch(&self, event: NavigationEvent);
}

/// One call to [`Host::render`] on a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub components: Vec<String>,
    pub status: u16,
    pub error: Option<String>,
    pub hydrate: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: Vec<(Url, HistoryState)>,
    position: usize,
    scroll: ScrollPosition,
    max_scroll_y: i64,
    anchors: Vec<String>,
    mount_scroll: Option<ScrollPosition>,
    pending_mount_scroll: Option<ScrollPosition>,
    renders: Vec<Rendered>,
    assigned: Vec<Url>,
    events: Vec<NavigationEvent>,
    focus_resets: usize,
}

/// An in-memory host: a history stack, a scroll offset and a log of what
/// was rendered and dispatched.
#[derive(Debug)]
pub struct MemoryHost {
    state: Mutex<MemoryState>,
}

impl MemoryHost {
    pub fn new(url: Url) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                entries: vec![(url, HistoryState::default())],
                max_scroll_y: 10_000,
                ..MemoryState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Elements with these ids exist for `scroll_into_view`.
    pub fn with_anchors(self, ids: &[&str]) -> Self {
        self.lock().anchors = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// Simulate a component that scrolls to `position` when it mounts.
    pub fn scroll_on_mount(&self, position: Option<ScrollPosition>) {
        self.lock().mount_scroll = position;
    }

    pub fn set_scroll(&self, position: ScrollPosition) {
        self.lock().scroll = position;
    }

    pub fn set_max_scroll_y(&self, max: i64) {
        self.lock().max_scroll_y = max;
    }

    /// Simulate the user pressing back/forward: move by `delta` and return
    /// the state a `popstate` event would carry.
    pub fn traverse(&self, delta: i64) -> Option<HistoryState> {
        let mut state = self.lock();
        let target = state.position as i64 + delta;
        if target < 0 || target as usize >= state.entries.len() {
            return None;
        }
        state.position = target as usize;
        Some(state.entries[state.position].1.clone())
    }

    pub fn history_len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn renders(&self) -> Vec<Rendered> {
        self.lock().renders.clone()
    }

    pub fn last_render(&self) -> Option<Rendered> {
        self.lock().renders.last().cloned()
    }

    pub fn assigned(&self) -> Vec<Url> {
        self.lock().assigned.clone()
    }

    pub fn events(&self) -> Vec<NavigationEvent> {
        self.lock().events.clone()
    }

    pub fn focus_resets(&self) -> usize {
        self.lock().focus_resets
    }
}

impl Host for MemoryHost {
    fn location(&self) -> Url {
        let state = self.lock();
        state.entries[state.position].0.clone()
    }

    fn history_state(&self) -> HistoryState {
        let state = self.lock();
        state.entries[state.position].1.clone()
    }

    fn push_state(&self, history: HistoryState, url: &Url) {
        let mut state = self.lock();
        let keep = state.position + 1;
        state.entries.truncate(keep);
        state.entries.push((url.clone(), history));
        state.position = keep;
    }

    fn replace_state(&self, history: HistoryState, url: &Url) {
        let mut state = self.lock();
        let position = state.position;
        state.entries[position] = (url.clone(), history);
    }

    fn go(&self, delta: i64) {
        let _ = self.traverse(delta);
    }

    fn scroll(&self) -> ScrollPosition {
        self.lock().scroll
    }

    fn max_scroll_y(&self) -> i64 {
        self.lock().max_scroll_y
    }

    fn scroll_to(&self, position: ScrollPosition) {
        self.lock().scroll = position;
    }

    fn scroll_into_view(&self, id: &str) -> bool {
        let mut state = self.lock();
        match state.anchors.iter().position(|anchor| anchor == id) {
            Some(i) => {
                state.scroll = ScrollPosition::new(0, 100 * (i as i64 + 1));
                true
            }
            None => false,
        }
    }

    fn reset_focus(&self) {
        self.lock().focus_resets += 1;
    }

    fn render(&self, props: &RenderProps, hydrate: bool) {
        let mut state = self.lock();
        state.renders.push(Rendered {
            components: props
                .components
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            status: props.status,
            error: props.error.as_ref().map(ToString::to_string),
            hydrate,
        });
        state.pending_mount_scroll = state.mount_scroll;
    }

    fn tick(&self) {
        let mut state = self.lock();
        if let Some(position) = state.pending_mount_scroll.take() {
            state.scroll = position;
        }
    }

    fn assign(&self, url: &Url) {
        self.lock().assigned.push(url.clone());
    }

    fn dispatch(&self, event: NavigationEvent) {
        self.lock().events.push(event);
    }
}
