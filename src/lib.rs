//! Routing, data loading and navigation runtime for server-rendered apps
//! that hydrate into client-side routing.
//!
//! The same [`load::LoadEngine`] runs on the server, inside
//! [`server::Server`], and in the browser, inside
//! [`client::NavigationController`].

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod http;
pub mod lifecycle;
pub mod load;
pub mod observability;
pub mod routing;
pub mod server;

pub use client::NavigationController;
pub use config::KitConfig;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load::{load_fn, LoadOutput};
pub use routing::{Component, Fallback, Manifest};
pub use server::{endpoint_fn, EndpointOutput, Server};
