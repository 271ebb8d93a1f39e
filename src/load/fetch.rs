//! The fetch capability handed to loads.
//!
//! # Responsibilities
//! - Define the request/response shapes a load sees
//! - Abstract the transport behind [`Fetch`] so the same engine runs on the
//!   client (network or hydration data) and the server (asset, internal
//!   re-entry or external call)
//! - Describe the serialized form of a fetched response that the server
//!   embeds for hydration
//!
//! # Design Decisions
//! - Bodies are buffered; loads read them as text or JSON
//! - `set-cookie` and `etag` never reach the serialized form

use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Whether cookies and authorization may travel with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// Request body. Internal server re-entry only accepts text.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchBody {
    Text(String),
    Binary(Bytes),
}

impl FetchBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FetchBody::Text(text) => text.as_bytes(),
            FetchBody::Binary(bytes) => bytes,
        }
    }
}

/// Options a load passes alongside the URL.
#[derive(Debug, Clone, Default)]
pub struct FetchInit {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<FetchBody>,
    pub credentials: Credentials,
}

impl FetchInit {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set a header. Invalid names or values are dropped with a warning.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid fetch header"),
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(FetchBody::Text(body.into()));
        self
    }

    pub fn with_binary_body(mut self, body: Bytes) -> Self {
        self.body = Some(FetchBody::Binary(body));
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A fetch as seen by a [`Fetch`] implementation.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// The URL exactly as the load wrote it.
    pub url: String,
    /// `url` resolved against the page it was issued from.
    pub href: Url,
    pub init: FetchInit,
}

impl FetchRequest {
    /// Raw search string of the request, without the leading `?`.
    pub fn search(&self) -> &str {
        self.url.split_once('?').map(|(_, q)| q).unwrap_or_default()
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    credentialed: bool,
}

impl FetchResponse {
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            credentialed: false,
        }
    }

    /// Mark the response as obtained with forwarded credentials.
    pub fn credentialed(mut self) -> Self {
        self.credentialed = true;
        self
    }

    pub fn is_credentialed(&self) -> bool {
        self.credentialed
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Fetch {
            url: String::new(),
            reason: format!("invalid JSON body: {e}"),
        })
    }

    /// All `set-cookie` values.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }
}

/// A fetched response recorded for hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedFetch {
    pub url: String,
    /// Hash of the request body, if the request had one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub body_hash: Option<String>,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl SerializedFetch {
    pub fn record(request: &FetchRequest, response: &FetchResponse) -> Self {
        let headers = response
            .headers
            .iter()
            .filter(|(name, _)| *name != "set-cookie" && *name != "etag")
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            url: request.url.clone(),
            body_hash: request
                .init
                .body
                .as_ref()
                .map(|b| crate::hash::content_hash(b.as_bytes())),
            status: response.status,
            headers,
            body: response.text(),
        }
    }

    /// Rebuild the response this record was taken from.
    pub fn to_response(&self) -> FetchResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        FetchResponse::new(self.status, headers, self.body.clone())
    }
}

/// Transport used by loads.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// Plain network fetch over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct NetworkFetch {
    client: reqwest::Client,
}

impl NetworkFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for NetworkFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let href = request.href.to_string();
        let mut builder = self
            .client
            .request(request.init.method.clone(), request.href.clone())
            .headers(request.init.headers.clone());
        if let Some(body) = request.init.body {
            builder = match body {
                FetchBody::Text(text) => builder.body(text),
                FetchBody::Binary(bytes) => builder.body(bytes),
            };
        }

        let response = builder.send().await.map_err(|e| Error::Fetch {
            url: href.clone(),
            reason: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| Error::Fetch {
            url: href,
            reason: e.to_string(),
        })?;

        Ok(FetchResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str, body: Option<&str>) -> FetchRequest {
        let mut init = FetchInit::default();
        if let Some(body) = body {
            init = init.with_body(body);
        }
        FetchRequest {
            url: url.to_string(),
            href: Url::parse("https://example.com").unwrap().join(url).unwrap(),
            init,
        }
    }

    #[test]
    fn test_serialized_fetch_strips_cookie_and_etag() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("etag", HeaderValue::from_static("\"abc\""));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        let response = FetchResponse::new(200, headers, "{\"ok\":true}");

        let record = SerializedFetch::record(&request("/api/data", None), &response);
        assert_eq!(record.headers.len(), 1);
        assert_eq!(record.body, "{\"ok\":true}");
        assert!(record.body_hash.is_none());

        let rebuilt = record.to_response();
        assert_eq!(rebuilt.status, 200);
        assert!(rebuilt.headers.get("etag").is_none());
    }

    #[test]
    fn test_serialized_fetch_hashes_request_body() {
        let response = FetchResponse::new(201, HeaderMap::new(), "created");
        let record = SerializedFetch::record(&request("/api/items", Some("{\"a\":1}")), &response);
        assert_eq!(
            record.body_hash,
            Some(crate::hash::content_hash(b"{\"a\":1}"))
        );
    }

    #[test]
    fn test_set_cookies_collects_every_value() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        let response = FetchResponse::new(200, headers, "");
        assert_eq!(response.set_cookies(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_search_is_taken_from_raw_url() {
        assert_eq!(request("/api?x=1", None).search(), "x=1");
        assert_eq!(request("/api", None).search(), "");
    }
}
