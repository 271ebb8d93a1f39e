//! Request and response shapes of the server pipeline.

use axum::body::Bytes;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};

use crate::load::Query;
use crate::routing::Params;
use crate::server::body::RequestBody;

/// A request as handed to the pipeline by the host.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// `protocol://host` the request was addressed to.
    pub origin: String,
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw path, still percent-encoded.
    pub path: String,
    pub query: Query,
    pub raw_body: Option<Bytes>,
}

impl IncomingRequest {
    pub fn get(origin: impl Into<String>, path: impl Into<String>, query: &str) -> Self {
        Self {
            origin: origin.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            path: path.into(),
            query: Query::parse(query),
            raw_body: None,
        }
    }

    /// Set a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// A request after header normalisation and body parsing, as seen by hooks
/// and endpoints.
#[derive(Debug, Clone)]
pub struct ServerRequest {
    pub origin: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub path: String,
    pub query: Query,
    pub raw_body: Option<Bytes>,
    pub body: RequestBody,
    /// Filled in once a route matched.
    pub params: Params,
    /// Per-request scratch space for hooks.
    pub locals: Map<String, Value>,
}

impl ServerRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// What the pipeline produces. Header names are case-insensitive; repeated
/// headers such as `set-cookie` hold several values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ServerResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self::new(status).with_header(LOCATION.as_str(), location)
    }

    /// Set (replace) a header. Invalid names or values are dropped with a
    /// warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
        self
    }

    /// Append a header value, keeping existing ones.
    pub fn append_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }
}
