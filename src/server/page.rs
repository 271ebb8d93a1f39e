//! Page rendering on the server: waterfall, redirects, error pages and
//! response headers.

use std::sync::Arc;

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, SET_COOKIE};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::load::{NavigationInfo, NavigationResult};
use crate::routing::{decode_path, PageRoute, Params};
use crate::server::render::HydrationData;
use crate::server::request::{ServerRequest, ServerResponse};
use crate::server::{RequestState, Server};

/// Characters escaped in redirect locations; non-ASCII is always escaped.
const LOCATION: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// The session of one request. The session hook runs on first use only,
/// however many candidate routes or error pages need it.
pub(crate) struct RequestSession<'a> {
    request: &'a ServerRequest,
    value: OnceCell<Arc<Value>>,
}

impl<'a> RequestSession<'a> {
    pub(crate) fn new(request: &'a ServerRequest) -> Self {
        Self {
            request,
            value: OnceCell::new(),
        }
    }

    pub(crate) async fn get(&self, server: &Server) -> Result<Arc<Value>> {
        self.value
            .get_or_try_init(|| async {
                let session = server.hooks().get_session.get_session(self.request).await?;
                Ok::<_, Error>(Arc::new(session))
            })
            .await
            .cloned()
    }
}

fn navigation_info(request: &ServerRequest) -> NavigationInfo {
    NavigationInfo {
        id: request.path.clone(),
        path: request.path.clone(),
        decoded_path: decode_path(&request.path).into_owned(),
        query: request.query.clone(),
        routes: Vec::new(),
    }
}

/// Render a matched page route. `Ok(None)` when the leaf fell through.
pub(crate) async fn render_page(
    server: &Server,
    request: &ServerRequest,
    route: &PageRoute,
    params: &Params,
    state: &RequestState,
    session: &RequestSession<'_>,
) -> Result<Option<ServerResponse>> {
    let pattern = route.pattern().source();
    if state.initiator.as_deref() == Some(pattern) {
        tracing::warn!(path = %request.path, pattern = %pattern, "Load fetched its own page");
        return Ok(Some(ServerResponse::text(
            404,
            format!("Not found: {}", request.path),
        )));
    }

    let session = session.get(server).await?;
    let ctx = server.load_context(request, state, session.clone(), Some(pattern.to_string()));
    let info = navigation_info(request);

    let Some(result) = server.engine().load_route(route, params, &info, &ctx).await? else {
        if let Some(fetched) = &state.fetched {
            return Ok(Some(ServerResponse::text(
                500,
                format!("Bad request in load function: failed to fetch {fetched}"),
            )));
        }
        return Ok(None);
    };

    if let Some(redirect) = &result.redirect {
        let location = utf8_percent_encode(&redirect.location, LOCATION).to_string();
        tracing::debug!(path = %request.path, location = %location, "Redirecting");
        return Ok(Some(ServerResponse::redirect(redirect.status, &location)));
    }

    Ok(Some(render_response(server, &result, &session)))
}

/// Render the fallback error branch for `status`.
pub(crate) async fn respond_with_error(
    server: &Server,
    request: &ServerRequest,
    status: u16,
    error: Error,
    state: &RequestState,
    session: &RequestSession<'_>,
) -> Result<ServerResponse> {
    let session = session.get(server).await?;
    let ctx = server.load_context(request, state, session.clone(), None);
    let result = server
        .engine()
        .load_error(status, error, &navigation_info(request), &ctx)
        .await?;
    Ok(render_response(server, &result, &session))
}

/// An empty client-rendered shell, used for prerender fallback pages.
pub(crate) async fn render_shell(
    server: &Server,
    session: &RequestSession<'_>,
) -> Result<ServerResponse> {
    let session = session.get(server).await?;
    let data = HydrationData {
        status: 200,
        session: session.as_ref().clone(),
        ..HydrationData::default()
    };
    Ok(ServerResponse::new(200)
        .with_header(CONTENT_TYPE.as_str(), "text/html; charset=utf-8")
        .with_body(server.renderer().render(&data)))
}

/// Serialize an assembled result into an HTML response.
pub(crate) fn render_response(
    server: &Server,
    result: &NavigationResult,
    session: &Value,
) -> ServerResponse {
    let data = HydrationData::from_result(result, session.clone(), server.options().dev);
    let mut response = ServerResponse::new(result.props.status)
        .with_header(CONTENT_TYPE.as_str(), "text/html; charset=utf-8");

    for node in &result.state.branch {
        if let Some(loaded) = &node.loaded {
            for (name, value) in &loaded.headers {
                response = response.with_header(name, value);
            }
        }
        for cookie in &node.set_cookies {
            response.append_header(SET_COOKIE.as_str(), cookie);
        }
    }

    if result.props.error.is_none() {
        if let Some(max_age) = result.max_age() {
            let scope = if result.is_private() { "private" } else { "public" };
            response = response.with_header(
                CACHE_CONTROL.as_str(),
                &format!("{scope}, max-age={max_age}"),
            );
        }
    }

    response.with_body(server.renderer().render(&data))
}
