//! Per-request session state.
//!
//! # States
//! ```text
//! Absent ──read──▶ Loaded ──write──▶ Dirty
//!   │
//!   └──write──▶ Fresh (new key, cookie not yet issued)
//! ```
//!
//! A first write on an `Absent` session provisions a new key without
//! consulting the store; call [`SessionContext::load`] first to modify an
//! existing session.

use axum::http::HeaderValue;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::store::{SessionData, SessionStore};
use super::SessionError;
use crate::config::SessionConfig;

/// Lifecycle of a request's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing resolved yet.
    Absent,
    /// Fetched from the store, unmodified.
    Loaded,
    /// Fetched and then mutated; pending persist.
    Dirty,
    /// Newly created; key not yet issued to the client.
    Fresh,
}

/// Lazily loaded session for one request.
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
    /// Key presented by the client cookie, if any.
    inbound_key: Option<String>,
    key: Option<String>,
    data: SessionData,
    state: SessionState,
    cleared: bool,
}

impl SessionContext {
    pub fn new(
        store: Arc<dyn SessionStore>,
        config: Arc<SessionConfig>,
        inbound_key: Option<String>,
    ) -> Self {
        Self {
            store,
            config,
            inbound_key: inbound_key.filter(|k| !k.is_empty()),
            key: None,
            data: SessionData::new(),
            state: SessionState::Absent,
            cleared: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session key, resolving it from the inbound cookie if needed.
    pub fn key(&self) -> Result<&str, SessionError> {
        self.key
            .as_deref()
            .or(self.inbound_key.as_deref())
            .ok_or(SessionError::NoSessionId)
    }

    /// Fetch the session named by the inbound cookie. No-op unless `Absent`.
    pub async fn load(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Absent {
            return Ok(());
        }
        let key = self.key()?.to_string();
        self.data = self.store.get(&key).await?;
        self.key = Some(key);
        self.state = SessionState::Loaded;
        Ok(())
    }

    /// Raw stored value for `name`.
    pub async fn get_value(&mut self, name: &str) -> Result<Option<serde_json::Value>, SessionError> {
        self.load().await?;
        Ok(self.data.get(name).cloned())
    }

    /// Typed value for `name`; `Ok(None)` when the session lacks it.
    pub async fn get<T: DeserializeOwned>(&mut self, name: &str) -> Result<Option<T>, SessionError> {
        match self.get_value(name).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` under `name`.
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        match self.state {
            SessionState::Absent => {
                self.key = Some(new_session_key(self.config.key_length));
                self.data = SessionData::new();
                self.state = SessionState::Fresh;
                self.cleared = false;
            }
            SessionState::Loaded => self.state = SessionState::Dirty,
            SessionState::Dirty | SessionState::Fresh => {}
        }
        self.data.insert(name.to_string(), value);
        Ok(())
    }

    /// Delete the session from the store and forget it for this request.
    pub async fn clear(&mut self) -> Result<(), SessionError> {
        let key = match self.key() {
            Ok(key) => key.to_string(),
            Err(SessionError::NoSessionId) => return Ok(()),
            Err(e) => return Err(e),
        };
        let was_fresh = self.state == SessionState::Fresh;
        self.key = None;
        self.inbound_key = None;
        self.data.clear();
        self.state = SessionState::Absent;
        if !was_fresh {
            self.store.delete(&key).await?;
            self.cleared = true;
        }
        Ok(())
    }

    /// Whether the completed response must carry a new session cookie.
    pub fn issues_cookie(&self) -> bool {
        self.state == SessionState::Fresh
    }

    /// Whether the session must be written back after rendering.
    pub fn needs_persist(&self) -> bool {
        matches!(self.state, SessionState::Fresh | SessionState::Dirty)
    }

    /// Whether the session was deleted during this request.
    pub fn was_cleared(&self) -> bool {
        self.cleared
    }

    /// Write the session back to the store.
    pub async fn persist(&self) -> Result<(), SessionError> {
        let key = self.key.as_deref().ok_or(SessionError::NoSessionId)?;
        self.store.set(key, self.data.clone()).await
    }

    /// `Set-Cookie` value issuing the current key.
    pub fn issue_cookie(&self) -> Option<HeaderValue> {
        let key = self.key.as_deref()?;
        HeaderValue::from_str(&self.cookie_string(key, false)).ok()
    }

    /// `Set-Cookie` value expiring the client's cookie.
    pub fn expire_cookie(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.cookie_string("", true)).ok()
    }

    fn cookie_string(&self, value: &str, expire: bool) -> String {
        let mut cookie = format!(
            "{}={}; Path={}",
            self.config.cookie_name, value, self.config.cookie_path
        );
        if expire {
            cookie.push_str("; Max-Age=0");
        }
        if self.config.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("state", &self.state)
            .field("keys", &self.data.len())
            .finish_non_exhaustive()
    }
}

/// Random alphanumeric session key.
pub fn new_session_key(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
