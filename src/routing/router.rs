//! Route lookup.
//!
//! # Responsibilities
//! - Test each compiled route against a decoded path
//! - Return every match with its extracted params, or an empty list
//!
//! # Design Decisions
//! - O(n) scan in declaration order (acceptable for typical route counts)
//! - Explicit empty result rather than a silent default route

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::routing::manifest::Route;
use crate::routing::matcher::Params;

/// A route that matched a path, with its parameters already extracted.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Route,
    pub params: Params,
}

/// Ordered subset of `routes` whose pattern matches `decoded_path`.
pub fn candidates(routes: &[Route], decoded_path: &str) -> Vec<RouteMatch> {
    routes
        .iter()
        .filter_map(|route| {
            route.pattern().exec(decoded_path).map(|params| RouteMatch {
                route: route.clone(),
                params,
            })
        })
        .collect()
}

/// Percent-decode a raw URL path. Invalid UTF-8 sequences are kept lossily.
pub fn decode_path(path: &str) -> Cow<'_, str> {
    percent_decode_str(path).decode_utf8_lossy()
}
