//! The pipeline served over a real socket.

use serde_json::Value;
use tokio::net::TcpListener;

use kit_runtime::config::ServerConfig;
use kit_runtime::server::ServerOptions;
use kit_runtime::{HttpServer, Server, Shutdown};

mod common;
use common::blog_manifest;

#[tokio::test]
async fn test_blog_is_served_over_http_until_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let http = HttpServer::new(
        Server::new(blog_manifest(), ServerOptions::default()),
        &ServerConfig::default(),
    );
    let handle = tokio::spawn(http.run(listener, shutdown.signalled()));

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let page = client.get(format!("{base}/blog/hello")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    assert!(page.headers().contains_key("x-request-id"));
    assert!(page.text().await.unwrap().contains("Hello"));

    let post: Value = client
        .get(format!("{base}/api/posts/world.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(post["title"], "World");

    let missing = client.get(format!("{base}/nope")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    drop(client);
    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
