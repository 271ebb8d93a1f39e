//! Server-only endpoint routes.

use std::future::Future;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use serde_json::Value;

use crate::error::Result;
use crate::server::request::{ServerRequest, ServerResponse};

/// Body returned by an endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EndpointBody {
    #[default]
    Empty,
    Json(Value),
    Text(String),
    Binary(Bytes),
}

/// An endpoint's response before it becomes a [`ServerResponse`].
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointOutput {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: EndpointBody,
}

impl EndpointOutput {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: EndpointBody::Json(body),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: EndpointBody::Text(body.into()),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// JSON bodies get `application/json` unless a content type was set.
    pub fn into_response(self) -> ServerResponse {
        let mut response = ServerResponse::new(self.status);
        for (name, value) in &self.headers {
            response.append_header(name, value);
        }

        let has_type = response.headers.contains_key(CONTENT_TYPE);
        match self.body {
            EndpointBody::Empty => response,
            EndpointBody::Json(value) => {
                if !has_type {
                    response = response.with_header(CONTENT_TYPE.as_str(), "application/json");
                }
                response.with_body(value.to_string())
            }
            EndpointBody::Text(text) => response.with_body(text),
            EndpointBody::Binary(bytes) => response.with_body(bytes),
        }
    }
}

/// Handler for an endpoint route. Dispatch on `request.method` inside;
/// `Ok(None)` falls through to the next matching route.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn handle(&self, request: &ServerRequest) -> Result<Option<EndpointOutput>>;
}

/// Adapter turning a closure into an [`Endpoint`].
pub struct EndpointFn<F>(F);

pub fn endpoint_fn<F, Fut>(f: F) -> EndpointFn<F>
where
    F: Fn(ServerRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<EndpointOutput>>> + Send,
{
    EndpointFn(f)
}

#[async_trait]
impl<F, Fut> Endpoint for EndpointFn<F>
where
    F: Fn(ServerRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<EndpointOutput>>> + Send,
{
    async fn handle(&self, request: &ServerRequest) -> Result<Option<EndpointOutput>> {
        (self.0)(request.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_output_sets_content_type() {
        let response = EndpointOutput::json(json!({"title": "Hello"})).into_response();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body_text(), "{\"title\":\"Hello\"}");
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let response = EndpointOutput::json(json!([]))
            .with_header("Content-Type", "application/vnd.api+json")
            .into_response();
        assert_eq!(response.header("content-type"), Some("application/vnd.api+json"));
    }
}
