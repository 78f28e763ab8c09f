//! Pipeline registry and route selection.
//!
//! # Responsibilities
//! - Store (pattern, pipeline) entries in registration order
//! - Select the first entry whose pattern matches a path
//! - Build the registry from declarative pipeline definitions
//!
//! # Design Decisions
//! - First match wins; earlier, broader patterns shadow later ones
//! - No "most specific" ranking
//! - Populated at startup, read-only while serving
//! - Definition loading resolves every stage name eagerly and reports all
//!   problems at once

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::schema::PipelineConfig;
use crate::pipeline::{BoxStage, StageResolver};
use crate::routing::matcher::{PatternError, RoutePattern};

/// A named, ordered chain of stages bound to one route pattern.
pub struct Pipeline {
    name: String,
    doc: String,
    pattern: RoutePattern,
    stages: Vec<BoxStage>,
}

impl Pipeline {
    /// Compile `pattern` and bind it to `stages`.
    pub fn new(
        pattern: &str,
        name: impl Into<String>,
        stages: Vec<BoxStage>,
    ) -> Result<Self, PatternError> {
        Ok(Self {
            name: name.into(),
            doc: String::new(),
            pattern: RoutePattern::compile(pattern)?,
            stages,
        })
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn stages(&self) -> &[BoxStage] {
        &self.stages
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// Captures for one request plus the pipeline that matched.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub args: Vec<String>,
    pub kwargs: HashMap<String, String>,
    pub pipeline: Arc<Pipeline>,
}

/// A problem found while loading pipeline definitions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadProblem {
    #[error("pipeline {pipeline:?}: unknown stage {stage:?}")]
    UnknownStage { pipeline: String, stage: String },
    #[error("pipeline {pipeline:?}: {source}")]
    Pattern {
        pipeline: String,
        source: PatternError,
    },
}

/// Every problem found in a set of pipeline definitions.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to load pipelines: {}", .problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct LoadError {
    pub problems: Vec<LoadProblem>,
}

/// Ordered list of pipelines.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: Vec<Arc<Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pipeline. The pattern is compiled here, so a bad pattern
    /// fails registration rather than the first request.
    pub fn register(
        &mut self,
        pattern: &str,
        name: impl Into<String>,
        stages: Vec<BoxStage>,
    ) -> Result<(), PatternError> {
        let pipeline = Pipeline::new(pattern, name, stages)?;
        self.add(pipeline);
        Ok(())
    }

    /// Append an already-built pipeline.
    pub fn add(&mut self, pipeline: Pipeline) {
        self.pipelines.push(Arc::new(pipeline));
    }

    /// First pipeline, in registration order, whose pattern matches `path`.
    pub fn select(&self, path: &str) -> Option<RouteMatch> {
        self.pipelines.iter().find_map(|pipeline| {
            pipeline.pattern.captures(path).map(|caps| RouteMatch {
                args: caps.args,
                kwargs: caps.kwargs,
                pipeline: Arc::clone(pipeline),
            })
        })
    }

    /// Build a registry from declarative definitions, resolving stage names
    /// through `resolver`.
    pub fn from_definitions(
        definitions: &[PipelineConfig],
        resolver: &dyn StageResolver,
    ) -> Result<Self, LoadError> {
        let mut registry = Self::new();
        let mut problems = Vec::new();

        for def in definitions {
            let mut stages = Vec::with_capacity(def.stages.len());
            for name in &def.stages {
                match resolver.resolve(name) {
                    Some(stage) => stages.push(stage),
                    None => problems.push(LoadProblem::UnknownStage {
                        pipeline: def.name.clone(),
                        stage: name.clone(),
                    }),
                }
            }

            match Pipeline::new(&def.pattern, def.name.clone(), stages) {
                Ok(pipeline) => registry.add(pipeline.with_doc(def.doc.clone())),
                Err(source) => problems.push(LoadProblem::Pattern {
                    pipeline: def.name.clone(),
                    source,
                }),
            }
        }

        if problems.is_empty() {
            Ok(registry)
        } else {
            Err(LoadError { problems })
        }
    }

    pub fn pipelines(&self) -> &[Arc<Pipeline>] {
        &self.pipelines
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
