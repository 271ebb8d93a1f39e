//! ETag injection and conditional requests.

use axum::http::header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH};
use axum::http::HeaderMap;

use crate::hash::content_hash;
use crate::server::request::ServerResponse;

/// Tag a 200 response with a content hash, or turn it into an empty 304 when
/// the request already holds that tag. Responses whose `cache-control`
/// contains `no-store` or `immutable` pass through untouched.
pub fn apply(request_headers: &HeaderMap, response: ServerResponse) -> ServerResponse {
    if response.status != 200 {
        return response;
    }
    let cache_control = response.header(CACHE_CONTROL.as_str()).unwrap_or_default();
    if cache_control.contains("no-store") || cache_control.contains("immutable") {
        return response;
    }

    let etag = format!(
        "\"{}\"",
        content_hash(response.body.as_deref().unwrap_or_default())
    );

    let if_none_match = request_headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| match v.strip_prefix("W/") {
            Some(strong) if strong.starts_with('"') => strong,
            _ => v,
        });
    if if_none_match == Some(etag.as_str()) {
        return ServerResponse::new(304);
    }

    response.with_header(ETAG.as_str(), &etag)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn page() -> ServerResponse {
        ServerResponse::text(200, "<h1>Hello</h1>")
    }

    #[test]
    fn test_etag_added_then_matched() {
        let tagged = apply(&HeaderMap::new(), page());
        let etag = tagged.header("etag").unwrap().to_string();
        assert!(etag.starts_with('"') && etag.ends_with('"'));

        let mut headers = HeaderMap::new();
        headers.insert(IF_NONE_MATCH, HeaderValue::from_str(&etag).unwrap());
        let cached = apply(&headers, page());
        assert_eq!(cached.status, 304);
        assert!(cached.body.is_none());

        let mut weak = HeaderMap::new();
        weak.insert(IF_NONE_MATCH, HeaderValue::from_str(&format!("W/{etag}")).unwrap());
        assert_eq!(apply(&weak, page()).status, 304);
    }

    #[test]
    fn test_no_store_and_non_200_are_untouched() {
        let no_store = page().with_header("cache-control", "no-store");
        assert!(apply(&HeaderMap::new(), no_store).header("etag").is_none());

        let missing = ServerResponse::text(404, "nope");
        assert!(apply(&HeaderMap::new(), missing).header("etag").is_none());
    }
}
