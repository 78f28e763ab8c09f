//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Build the pipeline registry and dispatcher
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::config::{load_config, locate_config, ConfigError, RouterConfig};
use crate::dispatch::Dispatcher;
use crate::http::request_id::RequestIdError;
use crate::http::server::{self, ServerError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::{logging, metrics};
use crate::pipeline::StageResolver;
use crate::routing::{LoadError, PipelineRegistry};
use crate::session::MemorySessionStore;

/// Anything that stops the router from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pipelines(#[from] LoadError),
    #[error("cannot generate request ids: {0}")]
    RequestId(#[from] RequestIdError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Read the configuration file, or fall back to defaults when none exists.
pub fn load(explicit: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    match locate_config(explicit) {
        Some(path) => load_config(&path),
        None => Ok(RouterConfig::default()),
    }
}

/// Build a dispatcher for `config`, resolving stage names with `resolver`.
pub fn build_dispatcher(
    config: &RouterConfig,
    resolver: &dyn StageResolver,
) -> Result<Dispatcher, StartupError> {
    let registry = PipelineRegistry::from_definitions(&config.routes, resolver)?;
    for pipeline in registry.pipelines() {
        tracing::debug!(
            pipeline = pipeline.name(),
            pattern = %pipeline.pattern(),
            stages = pipeline.stages().len(),
            "Pipeline registered"
        );
    }

    let dispatcher = Dispatcher::builder(registry)
        .execution(&config.execution)
        .max_body_bytes(config.listener.max_body_bytes)
        .session_config(config.session.clone())
        .session_store(Arc::new(MemorySessionStore::new()))
        .build()?;
    Ok(dispatcher)
}

/// Start the router and serve until a stop signal arrives.
pub async fn run(config: RouterConfig, resolver: &dyn StageResolver) -> Result<(), StartupError> {
    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "stage-router starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let dispatcher = Arc::new(build_dispatcher(&config, resolver)?);
    tracing::info!(
        pipelines = dispatcher.registry().len(),
        timeout_secs = config.execution.timeout_secs,
        on_timeout = ?config.execution.on_timeout,
        "Dispatcher ready"
    );

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    spawn_signal_listener(Arc::clone(&shutdown));

    server::listen(
        &config.listener.bind_address,
        dispatcher,
        &config.listener,
        server_shutdown,
    )
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
