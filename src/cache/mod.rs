//! Result Cache
//!
//! # Data Flow
//! ```text
//! LoadEngine::load_route
//!     → ResultCache::get(path?query, session_id) → hit: shared Arc result
//!     → miss: run waterfall → leaf max_age > 0 → ResultCache::insert
//!
//! NavigationController::load / server prerender fetch
//!     → SingleFlight::run(key) → same in-flight future for concurrent callers
//! ```
//!
//! # Design Decisions
//! - Entries expire by timer or on the next session change, whichever first
//! - Expiry is checked lazily on read; no background sweeper task
//! - Single-flight futures are `Shared`, so every waiter sees the same output

pub mod result;
pub mod single_flight;

pub use result::ResultCache;
pub use single_flight::{Flight, SingleFlight};
