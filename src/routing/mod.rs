//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Build (at startup / reload):
//!     SitemapConfig
//!     → builder.rs (check component types, parse templates, compile patterns)
//!     → Sitemap (immutable node tree, views, resources)
//!
//! Per request:
//!     Environment + InvocationContext
//!     → node.rs (depth-first walk, first Handled wins)
//!         → wildcard.rs (captures pushed onto the result stack)
//!         → variables.rs (attributes resolved against captures / modules)
//!     → Completion (finalized pipeline, redirect / continuation, or nothing)
//! ```
//!
//! # Design Decisions
//! - Tree compiled once, shared read-only by concurrent requests
//! - All mutable state lives in the per-request context
//! - "No match" is an outcome, not an error

pub mod builder;
pub mod context;
pub mod node;
pub mod sitemap;
pub mod types;
pub mod variables;
pub mod wildcard;

pub use builder::SitemapBuilder;
pub use context::{Completion, InvocationContext, ResultStack};
pub use sitemap::Sitemap;
pub use types::{Location, Outcome, Role, SitemapError, SitemapResult};
pub use variables::{InputModule, ModuleRegistry, VariableResolver};
pub use wildcard::{MatchResult, WildcardPattern};
