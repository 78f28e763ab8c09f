//! stage-router
//!
//! An embedded HTTP request router: every request is matched to a named,
//! ordered chain of stages, which runs in its own task under a deadline
//! with panic recovery.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ dispatch::Dispatcher
//!                                        │  request id (http::request_id)
//!                                        │  select    (routing::PipelineRegistry)
//!                                        │  session   (session::SessionContext)
//!                                        ▼
//!                                  spawned chain task
//!                                  stage → stage → stage
//!                                        │
//!     Client Response                    ▼
//!     ◀────────────── Completed | Errored | Recovered | TimedOut
//! ```

use clap::Parser;
use std::path::PathBuf;

use stage_router::lifecycle::startup;
use stage_router::pipeline::StageTable;

#[derive(Parser, Debug)]
#[command(name = "stage-router", version, about = "Embedded HTTP stage router")]
struct Args {
    /// Configuration file (TOML). Falls back to ./router.toml, then defaults.
    #[arg(short, long, env = "STAGE_ROUTER_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = startup::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    let stages = StageTable::with_builtins();
    if args.check {
        let dispatcher = startup::build_dispatcher(&config, &stages)?;
        println!("configuration ok: {} pipelines", dispatcher.registry().len());
        return Ok(());
    }

    startup::run(config, &stages).await?;
    Ok(())
}
