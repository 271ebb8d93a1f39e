//! Request body parsing by content type.

use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::{Error, Result};

/// A parsed request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    None,
    Text(String),
    Json(Value),
    Form(Vec<(String, String)>),
    /// Any other content type, left untouched.
    Raw(Bytes),
}

impl RequestBody {
    /// First form value for `key`.
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match self {
            RequestBody::Form(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Parse `raw` according to the request's `content-type`.
pub fn parse_body(raw: Option<&Bytes>, headers: &HeaderMap) -> Result<RequestBody> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return Ok(RequestBody::None);
    };

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let text = || {
        std::str::from_utf8(raw).map_err(|e| Error::InvalidBody(format!("body is not UTF-8: {e}")))
    };

    match mime.as_str() {
        "text/plain" => Ok(RequestBody::Text(text()?.to_string())),
        "application/json" => serde_json::from_str(text()?)
            .map(RequestBody::Json)
            .map_err(|e| Error::InvalidBody(e.to_string())),
        "application/x-www-form-urlencoded" => Ok(RequestBody::Form(
            form_urlencoded::parse(raw)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )),
        _ => Ok(RequestBody::Raw(raw.clone())),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_json_body() {
        let raw = Bytes::from_static(b"{\"a\":1}");
        let body = parse_body(Some(&raw), &headers("application/json; charset=utf-8")).unwrap();
        assert_eq!(body, RequestBody::Json(json!({"a": 1})));
    }

    #[test]
    fn test_form_body() {
        let raw = Bytes::from_static(b"name=Ada+L&x=%2F");
        let body = parse_body(Some(&raw), &headers("application/x-www-form-urlencoded")).unwrap();
        assert_eq!(body.form_value("name"), Some("Ada L"));
        assert_eq!(body.form_value("x"), Some("/"));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let raw = Bytes::from_static(b"{nope");
        let err = parse_body(Some(&raw), &headers("application/json")).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_missing_or_unknown_bodies() {
        assert_eq!(parse_body(None, &HeaderMap::new()).unwrap(), RequestBody::None);
        let raw = Bytes::from_static(b"\x00\x01");
        assert_eq!(
            parse_body(Some(&raw), &headers("application/octet-stream")).unwrap(),
            RequestBody::Raw(raw.clone())
        );
    }
}
