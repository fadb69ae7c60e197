//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Ctrl+C / trigger() → broadcast → server stops accepting → drain
//!
//! Cancellation (cancel.rs):
//!     request dropped / timed out → CancelToken set
//!     → tree walker aborts at the next node boundary
//! ```
//!
//! # Design Decisions
//! - Shutdown is process-wide, cancellation is per request
//! - In-flight component calls are never interrupted by the walker

pub mod cancel;
pub mod shutdown;

pub use cancel::{CancelOnDrop, CancelToken};
pub use shutdown::Shutdown;
