//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Registration (at startup):
//!     pattern text + name + stages
//!     → matcher.rs (compile regex, record group names)
//!     → router.rs (append to ordered registry)
//!
//! Incoming Request (path):
//!     → router.rs (scan entries in registration order)
//!     → matcher.rs (regex captures → args / kwargs)
//!     → Return: RouteMatch or None
//! ```
//!
//! # Design Decisions
//! - Patterns compiled at registration, immutable at runtime
//! - Deterministic: same input always matches same pipeline
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{Captures, PatternError, RoutePattern};
pub use router::{LoadError, LoadProblem, Pipeline, PipelineRegistry, RouteMatch};
