//! Sitemap routing library.
//!
//! A compile-once processing tree that routes each request to a content
//! pipeline (generator, transformers, serializer), a redirect, or a
//! continuation.

pub mod components;
pub mod config;
pub mod environment;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;

pub use config::schema::SitemapConfig;
pub use environment::{Environment, RequestEnvironment};
pub use http::HttpServer;
pub use lifecycle::{CancelToken, Shutdown};
pub use routing::{Completion, InvocationContext, Outcome, Sitemap, SitemapBuilder, SitemapError};
