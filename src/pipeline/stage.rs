//! The stage abstraction.
//!
//! A stage looks at the request and either passes it on, answers it, or
//! fails it. Answering or failing ends the chain; passing continues it.

use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::error::StageError;
use crate::http::request::Request;
use crate::http::response::Response;

/// What a stage decided to do with the request.
pub enum Step {
    /// Hand the request to the next stage.
    Continue,
    /// End the chain with this response.
    Respond(Box<dyn Response>),
}

/// Result of running one stage.
pub type StageResult = Result<Step, StageError>;

impl Step {
    pub fn respond(response: impl Response) -> StageResult {
        Ok(Step::Respond(Box::new(response)))
    }

    /// Build a step from the two-slot form some stages produce.
    ///
    /// A response alone responds, an error alone fails, neither continues.
    /// Both together is not a valid stage result and is treated as
    /// `Continue`.
    pub fn from_parts(response: Option<Box<dyn Response>>, error: Option<StageError>) -> StageResult {
        match (response, error) {
            (Some(response), None) => Ok(Step::Respond(response)),
            (None, Some(error)) => Err(error),
            (None, None) => Ok(Step::Continue),
            (Some(response), Some(error)) => {
                tracing::warn!(
                    status = %response.status(),
                    error = %error,
                    "Stage returned both a response and an error; continuing"
                );
                Ok(Step::Continue)
            }
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Continue => f.write_str("Continue"),
            Step::Respond(r) => f.debug_tuple("Respond").field(&r.status()).finish(),
        }
    }
}

/// One handler in a pipeline.
pub trait Stage: Send + Sync + 'static {
    fn call<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, StageResult>;
}

/// Shared handle to a stage.
pub type BoxStage = Arc<dyn Stage>;

/// An async closure stage.
struct FnStage<F>(F);

impl<F> Stage for FnStage<F>
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, StageResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, StageResult> {
        (self.0)(req)
    }
}

/// A synchronous closure stage.
struct SyncStage<F>(F);

impl<F> Stage for SyncStage<F>
where
    F: Fn(&mut Request) -> StageResult + Send + Sync + 'static,
{
    fn call<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, StageResult> {
        let result = (self.0)(req);
        Box::pin(std::future::ready(result))
    }
}

/// Wrap an async closure as a stage.
///
/// The closure's future may borrow the request:
/// `stage_fn(|req| Box::pin(async move { ... }))`.
pub fn stage_fn<F>(f: F) -> BoxStage
where
    F: for<'a> Fn(&'a mut Request) -> BoxFuture<'a, StageResult> + Send + Sync + 'static,
{
    Arc::new(FnStage(f))
}

/// Wrap a synchronous closure as a stage.
pub fn sync_stage<F>(f: F) -> BoxStage
where
    F: Fn(&mut Request) -> StageResult + Send + Sync + 'static,
{
    Arc::new(SyncStage(f))
}

/// Wrap an async closure whose future does not borrow the request.
pub fn owned_stage<F, Fut>(f: F) -> BoxStage
where
    F: Fn(&mut Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StageResult> + Send + 'static,
{
    stage_fn(move |req| Box::pin(f(req)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::PlaintextResponse;
    use axum::http::StatusCode;

    #[test]
    fn from_parts_rules() {
        let resp = || Some(Box::new(PlaintextResponse::ok("x")) as Box<dyn Response>);
        let err = || Some(StageError::internal("boom"));

        assert!(matches!(Step::from_parts(resp(), None), Ok(Step::Respond(_))));
        assert!(Step::from_parts(None, err()).is_err());
        assert!(matches!(Step::from_parts(None, None), Ok(Step::Continue)));
        assert!(matches!(Step::from_parts(resp(), err()), Ok(Step::Continue)));
    }

    #[test]
    fn respond_boxes_response() {
        match Step::respond(PlaintextResponse::new("gone", StatusCode::GONE)) {
            Ok(Step::Respond(r)) => assert_eq!(r.status(), StatusCode::GONE),
            other => panic!("unexpected {:?}", other),
        }
    }
}
