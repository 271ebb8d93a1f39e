//! kit-runtime demo server.
//!
//! Serves a small blog: `/`, `/blog/[slug]` and the JSON endpoint its load
//! fetches from, `/api/posts/[slug].json`.

use std::path::PathBuf;

use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use kit_runtime::config::{load_config, KitConfig};
use kit_runtime::observability::{logging, metrics};
use kit_runtime::{
    endpoint_fn, load_fn, Component, EndpointOutput, Fallback, HttpServer, LoadOutput, Manifest,
    Server, Shutdown,
};

#[derive(Debug, Parser)]
#[command(name = "kit-runtime", version, about = "Serve the kit-runtime demo app")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address from the configuration.
    #[arg(long)]
    bind: Option<String>,
}

fn title_case(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn blog_manifest() -> kit_runtime::Result<Manifest> {
    let fallback = Fallback {
        layout: Component::new("__layout").into_ref(),
        error: Component::new("__error").into_ref(),
    };
    let layout = Component::new("__layout").into_ref();
    let home = Component::new("index").into_ref();
    let post = Component::new("blog/[slug]")
        .with_load(load_fn(|input| async move {
            let slug = input.page().param("slug").unwrap_or_default().to_string();
            let response = input.fetch(&format!("/api/posts/{slug}.json")).await?;
            if !response.ok() {
                return Ok(Some(LoadOutput::error(
                    response.status,
                    format!("No post called {slug}"),
                )));
            }
            let post: Value = response.json()?;
            Ok(Some(LoadOutput::props(post).with_max_age(60)))
        }))
        .into_ref();

    Manifest::new(fallback)
        .page("/", vec![layout.clone(), home])?
        .page("/blog/[slug]", vec![layout, post])?
        .endpoint(
            "/api/posts/[slug].json",
            endpoint_fn(|request| async move {
                let slug = request.params.get("slug").cloned().unwrap_or_default();
                Ok(Some(EndpointOutput::json(json!({ "title": title_case(&slug) }))))
            }),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => KitConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    logging::init(Some(&config.observability.log_level));
    tracing::info!("kit-runtime v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.server.bind_address,
        base = %config.paths.base,
        trailing_slash = ?config.routing.trailing_slash,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = Server::new(blog_manifest()?, config.server_options());
    let listener = TcpListener::bind(&config.server.bind_address).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    HttpServer::new(server, &config.server)
        .run(listener, shutdown.signalled())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
