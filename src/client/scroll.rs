//! Post-navigation scroll policy.

use crate::client::host::ScrollPosition;

/// Vertical offset and its maximum at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollSample {
    pub y: i64,
    pub max_y: i64,
}

/// What to do with the scroll position once the new page has mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollAction {
    /// Mount code already moved the page; leave it alone.
    Keep,
    To(ScrollPosition),
    IntoView(String),
    Top,
}

/// Whether the offset after mounting is what plain browser navigation
/// would have produced: either clamped to the new maximum, or at the same
/// distance from the bottom of the page.
pub fn no_scroll_happened(before: ScrollSample, after: ScrollSample) -> bool {
    after.y == before.y.min(after.max_y) || before.max_y - before.y == after.max_y - after.y
}

/// Choose the scroll action: an explicit target first, then the hash
/// anchor, then the top of the page.
pub fn decide(
    before: ScrollSample,
    after: ScrollSample,
    explicit: Option<ScrollPosition>,
    hash: Option<&str>,
) -> ScrollAction {
    if !no_scroll_happened(before, after) {
        return ScrollAction::Keep;
    }
    if let Some(position) = explicit {
        return ScrollAction::To(position);
    }
    match hash.map(|h| h.trim_start_matches('#')).filter(|id| !id.is_empty()) {
        Some(id) => ScrollAction::IntoView(id.to_string()),
        None => ScrollAction::Top,
    }
}
