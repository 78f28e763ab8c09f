//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header (_din_session=<key>)
//!     → context.rs (lazy load on first read)
//!     → store.rs (SessionStore: get / set / delete)
//!
//! On a completed response:
//!     fresh  → Set-Cookie issued, then persisted
//!     dirty  → persisted after rendering
//! ```
//!
//! # Design Decisions
//! - The store is an external collaborator behind a trait; remote stores are
//!   as valid as the bundled in-memory one
//! - No per-key locking: concurrent writers to one key are last-writer-wins
//! - Session keys need uniqueness, not secrecy

pub mod context;
pub mod store;

pub use context::{SessionContext, SessionState};
pub use store::{MemorySessionStore, SessionData, SessionStore};

/// Errors raised by session access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The request carries no session cookie.
    #[error("request has no session id")]
    NoSessionId,
    /// The cookie names a session the store does not know.
    #[error("unknown session id")]
    UnknownSessionId,
    /// The backing store failed.
    #[error("session store error: {0}")]
    Store(String),
    /// A value could not be converted to or from its stored form.
    #[error("session value codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Codec(err.to_string())
    }
}
