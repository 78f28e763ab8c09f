//! Resolution of stage names used by declarative pipeline definitions.

use axum::http::StatusCode;
use std::collections::HashMap;

use crate::pipeline::builtin;
use crate::pipeline::stage::BoxStage;

/// Maps a stable name to a stage.
pub trait StageResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<BoxStage>;
}

/// In-memory name → stage table.
#[derive(Default, Clone)]
pub struct StageTable {
    stages: HashMap<String, BoxStage>,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table preloaded with `pass`, `ok` and `not_found`.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.insert("pass", builtin::pass());
        table.insert("ok", builtin::respond(StatusCode::OK, "ok"));
        table.insert("not_found", builtin::respond(StatusCode::NOT_FOUND, "404"));
        table
    }

    /// Add or replace a named stage.
    pub fn insert(&mut self, name: impl Into<String>, stage: BoxStage) -> &mut Self {
        self.stages.insert(name.into(), stage);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl StageResolver for StageTable {
    fn resolve(&self, name: &str) -> Option<BoxStage> {
        self.stages.get(name).cloned()
    }
}

impl std::fmt::Debug for StageTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.stages.keys()).finish()
    }
}
