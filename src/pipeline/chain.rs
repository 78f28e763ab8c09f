//! Sequential execution of a pipeline's stages.

use crate::error::StageError;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::pipeline::stage::{BoxStage, Step};

/// How a stage chain ended.
pub enum ChainResult {
    /// A stage answered.
    Responded(Box<dyn Response>),
    /// A stage failed.
    Failed(StageError),
    /// Every stage passed.
    Exhausted,
    /// The cancellation signal was raised between stages.
    Cancelled,
}

/// Run `stages` in order until one answers or fails.
///
/// The request's cancellation signal is checked before each stage.
pub async fn run_chain(stages: &[BoxStage], req: &mut Request) -> ChainResult {
    for (index, stage) in stages.iter().enumerate() {
        if req.cancellation().is_cancelled() {
            tracing::debug!(request_id = %req.id(), stage = index, "Chain cancelled");
            return ChainResult::Cancelled;
        }
        match stage.call(req).await {
            Ok(Step::Continue) => {}
            Ok(Step::Respond(response)) => return ChainResult::Responded(response),
            Err(err) => return ChainResult::Failed(err),
        }
    }
    ChainResult::Exhausted
}

impl std::fmt::Debug for ChainResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Responded(r) => f.debug_tuple("Responded").field(&r.status()).finish(),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
            Self::Exhausted => f.write_str("Exhausted"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}
