//! Pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Generate node   → descriptor.rs (set content source)
//! Transform nodes → descriptor.rs (append stages in order)
//! Serialize node  → descriptor.rs (finalize, optional cache key)
//!
//! Redirect / Call → redirect.rs (record target or continuation)
//!
//! Finalized descriptor → caller executes it, optionally via cache.rs
//! ```
//!
//! # Design Decisions
//! - One assembler and one redirector per request, never shared
//! - Cache storage is a collaborator; only keys are computed here

pub mod cache;
pub mod descriptor;
pub mod redirect;

pub use cache::{InMemoryCache, PipelineCache};
pub use descriptor::{OutputDescriptor, PipelineAssembler, PipelineDescriptor, StageDescriptor};
pub use redirect::{Dispatch, RedirectKind, Redirector};
