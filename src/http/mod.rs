//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, timeout, tracing span)
//!     → request.rs (request → RequestEnvironment)
//!     → routing::Sitemap::process (blocking thread)
//!     → server.rs (Completion → status, Location, JSON pipeline)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{apply_config_updates, AppState, HttpServer};
