//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that every route pattern compiles
//! - Detect duplicate pipeline names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Stage names are resolved later, by the registry loader, because only it
//!   knows which stages exist

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::RouterConfig;
use crate::routing::RoutePattern;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("execution.timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
    #[error("session.key_length must be greater than zero")]
    ZeroKeyLength,
    #[error("invalid session cookie name {0:?}")]
    InvalidCookieName(String),
    #[error("route #{index} has an empty name")]
    EmptyRouteName { index: usize },
    #[error("duplicate pipeline name {0:?}")]
    DuplicateName(String),
    #[error("{0}")]
    InvalidPattern(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.execution.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if config.session.key_length == 0 {
        errors.push(ValidationError::ZeroKeyLength);
    }
    if !is_cookie_token(&config.session.cookie_name) {
        errors.push(ValidationError::InvalidCookieName(
            config.session.cookie_name.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let mut names = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.name.trim().is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateName(route.name.clone()));
        }
        if let Err(e) = RoutePattern::compile(&route.pattern) {
            errors.push(ValidationError::InvalidPattern(e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// RFC 6265 cookie-name token.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}
