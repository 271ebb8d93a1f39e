//! The fetch capability loads get while rendering on the server.
//!
//! # Responsibilities
//! - Serve manifest assets directly
//! - Re-enter the pipeline for root-relative URLs, without a network hop
//! - Forward cookies/authorization only where the target may see them
//! - Hand everything else to the external fetch hook

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use url::Url;

use crate::error::{Error, Result};
use crate::load::{
    Credentials, Fetch, FetchBody, FetchInit, FetchRequest, FetchResponse, Query,
};
use crate::server::request::{IncomingRequest, ServerRequest, ServerResponse};
use crate::server::{RequestState, Server};

/// Server-side [`Fetch`] bound to the request being rendered.
pub struct ServerFetch {
    server: Server,
    origin: String,
    cookie: Option<HeaderValue>,
    authorization: Option<HeaderValue>,
    state: RequestState,
    /// Pattern of the page route doing the fetching.
    initiator: Option<String>,
}

impl ServerFetch {
    pub(crate) fn new(
        server: Server,
        request: &ServerRequest,
        state: RequestState,
        initiator: Option<String>,
    ) -> Self {
        Self {
            server,
            origin: request.origin.clone(),
            cookie: request.headers.get(COOKIE).cloned(),
            authorization: request.headers.get(AUTHORIZATION).cloned(),
            state,
            initiator,
        }
    }

    fn asset(&self, path: &str) -> Option<FetchResponse> {
        let options = self.server.options();
        let prefix = if options.assets.is_empty() {
            options.base.as_str()
        } else {
            options.assets.as_str()
        };
        let file = path.strip_prefix(prefix).unwrap_or(path);
        let file = file.strip_prefix('/').unwrap_or(file);

        let manifest = self.server.manifest();
        let (asset, content_type) = match manifest.asset_for(file) {
            Some(asset) => (asset, asset.content_type.as_deref()),
            None => {
                let index = format!("{file}/index.html");
                let asset = manifest.asset_for(&index)?;
                (asset, Some("text/html"))
            }
        };

        let mut headers = HeaderMap::new();
        if let Some(value) = content_type.and_then(|t| HeaderValue::from_str(t).ok()) {
            headers.insert(CONTENT_TYPE, value);
        }
        Some(FetchResponse::new(200, headers, asset.body.clone()))
    }

    async fn internal(&self, request: FetchRequest) -> Result<FetchResponse> {
        let FetchRequest { url, href, mut init } = request;
        let path = href.path().to_string();
        let search = url.split_once('?').map(|(_, q)| q).unwrap_or_default().to_string();

        let credentialed = init.credentials != Credentials::Omit;
        if credentialed {
            if let Some(cookie) = &self.cookie {
                init.headers.insert(COOKIE, cookie.clone());
            }
            if let Some(authorization) = &self.authorization {
                if !init.headers.contains_key(AUTHORIZATION) {
                    init.headers.insert(AUTHORIZATION, authorization.clone());
                }
            }
        }

        let raw_body = match init.body.take() {
            None => None,
            Some(FetchBody::Text(text)) => Some(Bytes::from(text)),
            Some(FetchBody::Binary(_)) => {
                return Err(Error::Fetch {
                    url,
                    reason: "Request body must be a string".into(),
                })
            }
        };

        let incoming = IncomingRequest {
            origin: self.origin.clone(),
            method: init.method.clone(),
            headers: init.headers.clone(),
            path: path.clone(),
            query: Query::parse(&search),
            raw_body,
        };
        let state = RequestState {
            initiator: self.initiator.clone(),
            fetched: Some(url.clone()),
            prerender: self.state.prerender.clone(),
        };

        let rendered = match &self.state.prerender {
            Some(prerender) => {
                let key = if search.is_empty() {
                    path.clone()
                } else {
                    format!("{path}?{search}")
                };
                let server = self.server.clone();
                prerender
                    .inflight
                    .run(&key, move || async move { server.respond(incoming, state).await })
                    .await
            }
            None => self.server.respond(incoming, state).await,
        };

        let Some(rendered) = rendered else {
            // Nothing in the manifest serves it; make a real request.
            let target = format!(
                "{}{}{}",
                self.origin,
                path,
                if search.is_empty() {
                    String::new()
                } else {
                    format!("?{search}")
                }
            );
            tracing::debug!(url = %target, "Internal fetch not served by any route, using network");
            let href = Url::parse(&target).map_err(|e| Error::Fetch {
                url: target.clone(),
                reason: e.to_string(),
            })?;
            let init = FetchInit {
                method: init.method,
                headers: init.headers,
                body: None,
                credentials: init.credentials,
            };
            return self
                .server
                .hooks()
                .external_fetch
                .fetch(FetchRequest {
                    url: target,
                    href,
                    init,
                })
                .await;
        };

        if let Some(prerender) = &self.state.prerender {
            prerender.dependencies.insert(path, rendered.clone());
        }

        let ServerResponse {
            status,
            headers,
            body,
        } = rendered;
        let response = FetchResponse::new(status, headers, body.unwrap_or_default());
        Ok(if credentialed {
            response.credentialed()
        } else {
            response
        })
    }

    async fn external(&self, request: FetchRequest) -> Result<FetchResponse> {
        let FetchRequest { url, href, mut init } = request;

        let mut credentialed = false;
        if init.credentials != Credentials::Omit && shares_cookies(&href, &self.origin) {
            credentialed = true;
            if let Some(cookie) = &self.cookie {
                init.headers.insert(COOKIE, cookie.clone());
            }
        }

        let response = self
            .server
            .hooks()
            .external_fetch
            .fetch(FetchRequest { url, href, init })
            .await?;
        Ok(if credentialed {
            response.credentialed()
        } else {
            response
        })
    }
}

/// Cookies pass to `target` when its host is the server's host or a
/// subdomain of it. Ports are ignored.
pub fn shares_cookies(target: &Url, origin: &str) -> bool {
    let (Some(fetch_host), Some(server_host)) = (
        target.host_str(),
        Url::parse(origin).ok().and_then(|o| o.host_str().map(str::to_string)),
    ) else {
        return false;
    };
    format!(".{fetch_host}").ends_with(&format!(".{server_host}"))
}

#[async_trait]
impl Fetch for ServerFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        if request.url.starts_with("//") {
            return Err(Error::Fetch {
                reason: format!(
                    "Cannot request protocol-relative URL ({}) in server-side fetch",
                    request.url
                ),
                url: request.url,
            });
        }

        // Absolute URLs go out; anything relative stays in-process.
        if Url::parse(&request.url).is_ok() {
            return self.external(request).await;
        }
        match self.asset(request.href.path()) {
            Some(asset) => Ok(asset),
            None => self.internal(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_passthrough_by_domain_suffix() {
        let origin = "https://my.domain.com:3000";
        let check = |url: &str| shares_cookies(&Url::parse(url).unwrap(), origin);

        assert!(check("https://my.domain.com/api"));
        assert!(check("https://sub.my.domain.com/api"));
        assert!(check("http://my.domain.com:8080/api"));
        assert!(!check("https://domain.com/api"));
        assert!(!check("https://api.domain.com/api"));
        assert!(!check("https://notmy.domain.com/api"));
    }
}
