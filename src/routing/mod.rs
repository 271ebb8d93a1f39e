//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Manifest (built ahead of time)
//!     → matcher.rs (compile patterns)
//!     → manifest.rs (components, page/endpoint routes, fallback pair)
//!
//! Decoded path at request/navigation time:
//!     → router.rs (test every route in declaration order)
//!     → Return: ordered candidates with extracted params
//! ```
//!
//! # Design Decisions
//! - Routes compiled once, immutable at runtime
//! - Declaration order is preserved; matching never reorders
//! - A candidate can still fail later (leaf fallthrough); that decision
//!   belongs to the load engine, not the matcher

pub mod manifest;
pub mod matcher;
pub mod router;
pub mod trailing_slash;

pub use manifest::{
    Asset, Component, ComponentRef, EndpointRoute, Fallback, Manifest, PageRoute, Route,
};
pub use matcher::{Params, RoutePattern};
pub use router::{decode_path, RouteMatch};
pub use trailing_slash::TrailingSlash;
