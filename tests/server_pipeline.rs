//! End-to-end behaviour of the server response pipeline, without HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::Method;
use serde_json::{json, Value};

use kit_runtime::server::{
    handle_fn, sequence, Handle, Hooks, IncomingRequest, PrerenderState, RequestState,
    ServerOptions, ServerRequest,
};
use kit_runtime::{load_fn, Component, LoadOutput, Manifest, Server};

mod common;
use common::{blog_manifest, fallback, ORIGIN};

fn server() -> Server {
    Server::new(blog_manifest(), ServerOptions::default())
}

async fn get(server: &Server, path: &str, query: &str) -> kit_runtime::server::ServerResponse {
    server
        .respond(IncomingRequest::get(ORIGIN, path, query), RequestState::default())
        .await
        .expect("top-level requests always get a response")
}

#[tokio::test]
async fn test_page_renders_with_endpoint_data_and_etag() {
    let server = server();

    let response = get(&server, "/blog/hello", "ref=x").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.header("cache-control"), Some("public, max-age=60"));
    assert!(response.body_text().contains("Hello"));

    let etag = response.header("etag").expect("etag is set").to_string();
    let revalidated = server
        .respond(
            IncomingRequest::get(ORIGIN, "/blog/hello", "ref=x")
                .with_header("if-none-match", &etag),
            RequestState::default(),
        )
        .await
        .unwrap();
    assert_eq!(revalidated.status, 304);
    assert!(revalidated.body.is_none());
}

#[tokio::test]
async fn test_trailing_slash_is_redirected_with_query() {
    let response = get(&server(), "/about/", "q=1").await;
    assert_eq!(response.status, 301);
    assert_eq!(response.header("location"), Some("/about?q=1"));
}

#[tokio::test]
async fn test_unknown_path_renders_404_error_page() {
    let response = get(&server(), "/nope", "").await;
    assert_eq!(response.status, 404);
    assert!(response.body_text().contains("Not found: /nope"));
}

#[tokio::test]
async fn test_load_error_status_reaches_response() {
    let response = get(&server(), "/blog/missing", "").await;
    assert_eq!(response.status, 404);
    assert!(response.header("cache-control").is_none());
}

#[tokio::test]
async fn test_endpoint_is_served_directly() {
    let response = get(&server(), "/api/posts/world.json", "").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_str(&response.body_text()).unwrap();
    assert_eq!(body, json!({ "title": "World" }));
}

#[tokio::test]
async fn test_session_reads_make_cache_control_private() {
    let hooks = Hooks::default().with_session(|request: &ServerRequest| {
        json!({ "user": request.header("x-user").unwrap_or("anonymous") })
    });
    let server = server().with_hooks(hooks);

    let response = server
        .respond(
            IncomingRequest::get(ORIGIN, "/me", "").with_header("x-user", "ada"),
            RequestState::default(),
        )
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("cache-control"), Some("private, max-age=30"));
    assert!(response.body_text().contains("ada"));
}

#[tokio::test]
async fn test_handle_hooks_wrap_the_pipeline_in_order() {
    let tag = |value: &'static str| -> Arc<dyn Handle> {
        Arc::new(handle_fn(move |request, resolve| async move {
            let response = resolve(request).await?;
            Ok(response.map(|r| {
                let seen = r.header("x-seen").map(|v| format!("{v},{value}"));
                r.with_header("x-seen", seen.as_deref().unwrap_or(value))
            }))
        }))
    };
    let server = server().with_hooks(Hooks::default().with_handle(sequence(vec![
        tag("outer"),
        tag("inner"),
    ])));

    let response = get(&server, "/about", "").await;
    assert_eq!(response.status, 200);
    // The inner hook sees the response first.
    assert_eq!(response.header("x-seen"), Some("inner,outer"));
}

#[tokio::test]
async fn test_handle_hook_errors_become_500() {
    let failing = handle_fn(|_request, _resolve| async move {
        Err(kit_runtime::Error::Fatal("database is down".into()))
    });
    let server = server().with_hooks(Hooks::default().with_handle(failing));

    let response = get(&server, "/", "").await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_text(), "database is down");
}

#[tokio::test]
async fn test_non_get_requests_reach_endpoints_with_parsed_body() {
    let mut request = IncomingRequest::get(ORIGIN, "/api/posts/hello.json", "")
        .with_header("content-type", "application/json");
    request.method = Method::POST;
    request.raw_body = Some(r#"{"draft":true}"#.into());

    let response = server()
        .respond(request, RequestState::default())
        .await
        .unwrap();
    assert_eq!(response.status, 200);

    let mut broken = IncomingRequest::get(ORIGIN, "/api/posts/hello.json", "")
        .with_header("content-type", "application/json");
    broken.method = Method::POST;
    broken.raw_body = Some("{not json".into());
    let response = server().respond(broken, RequestState::default()).await.unwrap();
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_prerender_records_internal_fetches() {
    let server = server();
    let pass = Arc::new(PrerenderState::new());

    let response = server
        .prerender(ORIGIN, "/blog/hello", pass.clone())
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(pass.dependencies.contains_key("/api/posts/hello.json"));

    let shell = server
        .prerender(ORIGIN, "/blog/anything", Arc::new(PrerenderState::fallback()))
        .await
        .unwrap();
    assert_eq!(shell.status, 200);
    assert!(!shell.body_text().contains("Anything"));
}

#[tokio::test]
async fn test_session_hook_runs_once_per_request() {
    let drafts = Component::new("drafts/new")
        .with_load(load_fn(|input| async move {
            // Reads the session, then declines the path.
            let _ = input.session();
            Ok(None)
        }))
        .into_ref();
    let post = Component::new("drafts/[slug]")
        .with_load(load_fn(|input| async move {
            let user = input.session()["user"].clone();
            Ok(Some(LoadOutput::props(json!({ "user": user }))))
        }))
        .into_ref();
    let manifest = Manifest::new(fallback())
        .page("/drafts/new", vec![drafts])
        .and_then(|m| m.page("/drafts/[slug]", vec![post]))
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let hooks = Hooks::default().with_session(move |_: &ServerRequest| {
        counter.fetch_add(1, Ordering::SeqCst);
        json!({ "user": "ada" })
    });
    let server = Server::new(manifest, ServerOptions::default()).with_hooks(hooks);

    let response = get(&server, "/drafts/new", "").await;
    assert_eq!(response.status, 200);
    assert!(response.body_text().contains("ada"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let missing = get(&server, "/elsewhere", "").await;
    assert_eq!(missing.status, 404);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
