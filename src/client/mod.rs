//! Client Navigation Controller
//!
//! # Data Flow
//! ```text
//! click / popstate / goto
//!     → before-navigate interceptors (any may veto)
//!     → history push/replace, tagged with a monotonically increasing index
//!     → navigating += 1 (Start fired on 0 → 1)
//!     → trailing-slash correction in place
//!     → LoadEngine::navigate (joined with a prefetch of the same target)
//!         → redirect → goto(replace) with the chain extended, or 500 on a loop
//!     → Host::render, page/navigating stores, scroll + focus
//!     → navigating -= 1 (End fired on 1 → 0)
//! ```
//!
//! # Design Decisions
//! - The browser is reached only through [`Host`]; [`MemoryHost`] stands in
//!   for it in tests
//! - A navigation token discards results that finish after a newer
//!   navigation started
//! - Stores are `tokio::sync::watch` channels

pub mod controller;
pub mod fetch;
pub mod host;
pub mod link;
pub mod scroll;

pub use controller::{
    ClientOptions, GotoOptions, HookId, Location, NavigationController, Navigating, RouterState,
};
pub use fetch::HydrationFetch;
pub use host::{HistoryState, Host, MemoryHost, NavigationEvent, Rendered, ScrollPosition};
pub use link::{classify, Anchor, ClickEvent, LinkAction, Modifiers};
pub use scroll::{ScrollAction, ScrollSample};
