//! Errors produced by pipeline stages.
//!
//! A stage either fails with a [`StageError::UserFacing`] error, whose status
//! and message are safe to show a client, or with an opaque error that maps to
//! a generic 500.

use axum::http::StatusCode;
use std::error::Error as StdError;
use std::sync::Arc;

use crate::session::SessionError;

/// Error returned by a stage to end its pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    /// Carries its own status code and a message safe to display.
    #[error("{message}")]
    UserFacing { status: StatusCode, message: String },

    /// Untyped failure. The message is for logs, not for clients.
    #[error("{0}")]
    Opaque(Arc<dyn StdError + Send + Sync>),
}

impl StageError {
    pub fn user_facing(status: StatusCode, message: impl Into<String>) -> Self {
        Self::UserFacing {
            status,
            message: message.into(),
        }
    }

    pub fn opaque<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Opaque(Arc::new(err))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::user_facing(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::user_facing(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::user_facing(StatusCode::BAD_REQUEST, message)
    }

    pub fn missing_kwarg(name: &str) -> Self {
        Self::bad_request(format!("missing required kwarg {}", name))
    }

    pub fn method_not_allowed() -> Self {
        Self::user_facing(StatusCode::METHOD_NOT_ALLOWED, "unsupported http method")
    }

    /// Status this error maps to: its own for user-facing errors, 500 otherwise.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UserFacing { status, .. } => *status,
            Self::Opaque(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::UserFacing { .. })
    }
}

impl From<SessionError> for StageError {
    fn from(err: SessionError) -> Self {
        Self::opaque(err)
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::opaque(err)
    }
}
