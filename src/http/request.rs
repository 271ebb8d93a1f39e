//! Request handling and transformation.
//!
//! # Responsibilities
//! - Buffer the body up to the configured limit
//! - Derive the origin the request was addressed to
//! - Convert into the pipeline's [`IncomingRequest`]

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, HeaderName, Request};
use uuid::Uuid;

use crate::load::Query;
use crate::server::IncomingRequest;

pub const X_REQUEST_ID: &str = "x-request-id";

/// How the origin of a request is determined.
#[derive(Debug, Clone)]
pub enum OriginSource {
    /// Every request has this origin.
    Fixed(String),
    /// `protocol://` plus the value of a host header.
    Header {
        protocol: String,
        host_header: HeaderName,
    },
}

impl OriginSource {
    pub fn origin(&self, headers: &HeaderMap) -> String {
        match self {
            OriginSource::Fixed(origin) => origin.trim_end_matches('/').to_string(),
            OriginSource::Header {
                protocol,
                host_header,
            } => {
                let host = headers
                    .get(host_header)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("localhost");
                format!("{protocol}://{host}")
            }
        }
    }
}

/// The request id assigned by the request-id layer, or a fresh one when the
/// router is served without it.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Buffer `request` into an [`IncomingRequest`]. Fails if the body is
/// larger than `max_body` bytes.
pub async fn into_incoming(
    request: Request<Body>,
    origin: &OriginSource,
    max_body: usize,
) -> Result<IncomingRequest, axum::Error> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, max_body).await?;

    Ok(IncomingRequest {
        origin: origin.origin(&parts.headers),
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: Query::parse(parts.uri.query().unwrap_or("")),
        headers: parts.headers,
        raw_body: (!bytes.is_empty()).then_some(bytes),
    })
}
