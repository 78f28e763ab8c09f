//! Session storage backends.

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;

use super::SessionError;

/// Key → value mapping held by one session.
pub type SessionData = HashMap<String, serde_json::Value>;

/// Keyed storage for session mappings.
///
/// `get` on an unknown key returns [`SessionError::UnknownSessionId`].
pub trait SessionStore: Send + Sync + 'static {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<SessionData, SessionError>>;

    fn set<'a>(&'a self, key: &'a str, data: SessionData) -> BoxFuture<'a, Result<(), SessionError>>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), SessionError>>;
}

/// In-process store backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<DashMap<String, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

impl SessionStore for MemorySessionStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<SessionData, SessionError>> {
        let found = self
            .inner
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(SessionError::UnknownSessionId);
        std::future::ready(found).boxed()
    }

    fn set<'a>(&'a self, key: &'a str, data: SessionData) -> BoxFuture<'a, Result<(), SessionError>> {
        self.inner.insert(key.to_string(), data);
        std::future::ready(Ok(())).boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), SessionError>> {
        self.inner.remove(key);
        std::future::ready(Ok(())).boxed()
    }
}
