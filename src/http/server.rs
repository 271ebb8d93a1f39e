//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum router with a single catch-all handler
//! - Wire up middleware (timeout, body limit, request ID, tracing)
//! - Hand every request to the response pipeline
//! - Record request metrics

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::request::{into_incoming, request_id, OriginSource};
use crate::http::response::{into_response, not_found};
use crate::observability::metrics;
use crate::server::{RequestState, Server};

/// Application state injected into the handler.
#[derive(Clone)]
struct AppState {
    server: Server,
    origin: Arc<OriginSource>,
    max_body: usize,
}

/// HTTP host for a [`Server`].
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(server: Server, config: &ServerConfig) -> Self {
        let origin = match &config.origin {
            Some(origin) => OriginSource::Fixed(origin.clone()),
            None => OriginSource::Header {
                protocol: config.protocol.clone(),
                host_header: HeaderName::from_bytes(config.host_header.as_bytes())
                    .unwrap_or(axum::http::header::HOST),
            },
        };
        let state = AppState {
            server,
            origin: Arc::new(origin),
            max_body: config.max_body_bytes,
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(pipeline_handler))
            .route("/", any(pipeline_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving it some other way.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` completes, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn pipeline_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let request_id = request_id(request.headers());
    let path = request.uri().path().to_string();

    tracing::debug!(request_id = %request_id, method = %method, path = %path, "Handling request");

    let incoming = match into_incoming(request, &state.origin, state.max_body).await {
        Ok(incoming) => incoming,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(&method, 413, start);
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let response = state
        .server
        .respond(incoming, RequestState::default())
        .await
        .unwrap_or_else(not_found);

    tracing::debug!(
        request_id = %request_id,
        path = %path,
        status = response.status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request complete"
    );
    metrics::record_request(&method, response.status, start);
    into_response(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Component, Fallback, Manifest};
    use crate::server::ServerOptions;
    use tower::ServiceExt;

    fn router() -> Router {
        let fallback = Fallback {
            layout: Component::new("__layout").into_ref(),
            error: Component::new("__error").into_ref(),
        };
        let manifest = Manifest::new(fallback)
            .page("/", vec![Component::new("index").into_ref()])
            .unwrap();
        let server = Server::new(manifest, ServerOptions::default());
        HttpServer::new(server, &ServerConfig::default()).router()
    }

    #[tokio::test]
    async fn test_requests_get_an_id_and_reach_the_pipeline() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_paths_render_404() {
        let response = router()
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
