//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Ctrl+C / test harness
//!     → Shutdown::trigger
//!     → HttpServer stops accepting, drains in-flight requests, returns
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
