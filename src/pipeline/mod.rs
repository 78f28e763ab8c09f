//! Pipeline stages.
//!
//! # Data Flow
//! ```text
//! Request
//!     → stage 1 → Continue
//!     → stage 2 → Continue
//!     → stage 3 → Respond(response) | Err(StageError)
//! ```
//!
//! # Design Decisions
//! - Stages run strictly in order, never concurrently for one request
//! - Answering or failing ends the chain
//! - Stage names are resolved once at load time, never per request

pub mod builtin;
pub mod chain;
pub mod resolver;
pub mod stage;

pub use builtin::MethodMux;
pub use chain::{run_chain, ChainResult};
pub use resolver::{StageResolver, StageTable};
pub use stage::{owned_stage, stage_fn, sync_stage, BoxStage, Stage, StageResult, Step};
