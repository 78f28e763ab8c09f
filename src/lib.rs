//! Embedded HTTP stage router library.

// Core subsystems
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod routing;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::RouterConfig;
pub use dispatch::{Dispatcher, Outcome};
pub use error::StageError;
pub use http::{HttpServer, Request};
pub use lifecycle::Shutdown;
pub use pipeline::{Stage, StageResult, Step};
pub use routing::PipelineRegistry;
