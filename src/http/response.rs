//! Conversion of pipeline responses into axum responses.

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;

use crate::server::ServerResponse;

pub fn into_response(response: ServerResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = Response::new(response.body.map(Body::from).unwrap_or_else(Body::empty));
    *out.status_mut() = status;
    *out.headers_mut() = response.headers;
    out
}

/// Response for requests no route served.
pub fn not_found() -> ServerResponse {
    ServerResponse::text(404, "Not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_headers_are_kept() {
        let response = into_response(
            ServerResponse::new(301).with_header("location", "/about"),
        );
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()["location"], "/about");
    }
}
