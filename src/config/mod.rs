//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (locate, parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → routes feed the PipelineRegistry loader; the rest configures the
//!       Dispatcher, listener and observability
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry is built once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{
    load_config, locate_config, parse_config, ConfigError, DEFAULT_CONFIG_FILE,
};
pub use schema::{
    ExecutionConfig, ListenerConfig, LogFormat, ObservabilityConfig, PipelineConfig,
    RouterConfig, SessionConfig, TimeoutPolicy,
};
pub use validation::{validate_config, ValidationError};
