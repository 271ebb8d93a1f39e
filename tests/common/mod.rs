//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use kit_runtime::load::{
    Credentials, Fetch, FetchInit, FetchRequest, FetchResponse, LoadInput,
};
use kit_runtime::routing::ComponentRef;
use kit_runtime::{
    endpoint_fn, load_fn, Component, EndpointOutput, Error, Fallback, LoadOutput, Manifest,
};

pub const ORIGIN: &str = "http://localhost";

/// Shared invocation counter for stub loads.
#[derive(Clone, Default)]
pub struct Runs(Arc<AtomicUsize>);

impl Runs {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A component whose load counts its runs and returns what `f` builds.
pub fn counting<F>(name: &str, runs: &Runs, f: F) -> ComponentRef
where
    F: Fn(&LoadInput) -> Option<LoadOutput> + Send + Sync + 'static,
{
    let runs = runs.clone();
    let f = Arc::new(f);
    Component::new(name)
        .with_load(load_fn(move |input| {
            let runs = runs.clone();
            let f = f.clone();
            async move {
                runs.bump();
                Ok((*f)(&input))
            }
        }))
        .into_ref()
}

pub fn fallback() -> Fallback {
    Fallback {
        layout: Component::new("__layout").into_ref(),
        error: Component::new("__error").into_ref(),
    }
}

/// Fetch that refuses every request.
pub struct NoNetwork;

#[async_trait]
impl Fetch for NoNetwork {
    async fn fetch(&self, request: FetchRequest) -> kit_runtime::Result<FetchResponse> {
        Err(Error::Fetch {
            url: request.url,
            reason: "network disabled in tests".into(),
        })
    }
}

fn title_case(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `/`, `/about`, `/blog/[slug]` (loads from the JSON endpoint, cacheable
/// for 60s), `/me` (reads the session) and `/api/posts/[slug].json`.
pub fn blog_manifest() -> Manifest {
    let layout = Component::new("__layout").into_ref();
    let home = Component::new("index").into_ref();
    let about = Component::new("about").into_ref();
    let post = Component::new("blog/[slug]")
        .with_load(load_fn(|input| async move {
            let slug = input.page().param("slug").unwrap_or_default().to_string();
            // Posts are public; keep cookies out so the page stays cacheable.
            let init = FetchInit::default().with_credentials(Credentials::Omit);
            let response = input
                .fetch_with(&format!("/api/posts/{slug}.json"), init)
                .await?;
            if !response.ok() {
                return Ok(Some(LoadOutput::error(response.status, "No such post")));
            }
            let post: Value = response.json()?;
            Ok(Some(LoadOutput::props(post).with_max_age(60)))
        }))
        .into_ref();
    let me = Component::new("me")
        .with_load(load_fn(|input| async move {
            let user = input.session()["user"].clone();
            Ok(Some(LoadOutput::props(json!({ "user": user })).with_max_age(30)))
        }))
        .into_ref();

    Manifest::new(fallback())
        .page("/", vec![layout.clone(), home])
        .and_then(|m| m.page("/about", vec![layout.clone(), about]))
        .and_then(|m| m.page("/blog/[slug]", vec![layout.clone(), post]))
        .and_then(|m| m.page("/me", vec![layout, me]))
        .and_then(|m| {
            m.endpoint(
                "/api/posts/[slug].json",
                endpoint_fn(|request| async move {
                    let slug = request.params.get("slug").cloned().unwrap_or_default();
                    if slug == "missing" {
                        return Ok(Some(
                            EndpointOutput::json(json!({ "message": "gone" })).with_status(404),
                        ));
                    }
                    Ok(Some(EndpointOutput::json(json!({ "title": title_case(&slug) }))))
                }),
            )
        })
        .expect("blog manifest patterns compile")
}
