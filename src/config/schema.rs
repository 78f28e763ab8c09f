//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Stage-chain execution settings.
    pub execution: ExecutionConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Pipeline definitions, in precedence order.
    pub routes: Vec<PipelineConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// What happens to a stage chain still running when its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Leave the task running in the background.
    #[default]
    Detach,
    /// Raise the request's cancellation signal; stages stop cooperatively.
    Cancel,
    /// Raise the signal and abort the task at its next suspension point.
    Abort,
}

/// Stage-chain execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock budget for one stage chain, in seconds.
    pub timeout_secs: u64,

    /// Fate of a chain that outlives its budget.
    pub on_timeout: TimeoutPolicy,

    /// Record a call-stack trace for stage panics.
    pub capture_backtrace: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            on_timeout: TimeoutPolicy::Detach,
            capture_backtrace: true,
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the session key.
    pub cookie_name: String,

    /// Cookie path attribute.
    pub cookie_path: String,

    /// Length of generated session keys.
    pub key_length: usize,

    /// Mark the cookie HttpOnly.
    pub http_only: bool,

    /// Mark the cookie Secure.
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "_din_session".to_string(),
            cookie_path: "/".to_string(),
            key_length: 32,
            http_only: false,
            secure: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A declarative pipeline definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Regular expression matched against the request path.
    pub pattern: String,

    /// Pipeline name for logging/metrics.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub doc: String,

    /// Stage names, resolved at load time.
    #[serde(default)]
    pub stages: Vec<String>,
}
