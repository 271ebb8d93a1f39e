//! HTTP host for the response pipeline.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, timeout, body limit, request id, trace)
//!     → request.rs (buffer body, derive origin → IncomingRequest)
//!     → Server::respond
//!     → response.rs (ServerResponse → axum Response; None → 404)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{OriginSource, X_REQUEST_ID};
pub use server::HttpServer;
