//! Stages shipped with the router.

use axum::http::{Method, StatusCode};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::StageError;
use crate::http::request::Request;
use crate::http::response::{PlaintextResponse, Redirect};
use crate::pipeline::stage::{sync_stage, BoxStage, Stage, StageResult, Step};

/// Continue to the next stage.
pub fn pass() -> BoxStage {
    sync_stage(|_| Ok(Step::Continue))
}

/// Always answer with a plaintext body.
pub fn respond(status: StatusCode, body: impl Into<String>) -> BoxStage {
    let body = body.into();
    sync_stage(move |_| Step::respond(PlaintextResponse::new(body.clone(), status)))
}

/// Always redirect to `location`.
pub fn redirect(location: impl Into<String>, status: StatusCode) -> BoxStage {
    let location = location.into();
    sync_stage(move |_| Step::respond(Redirect::new(location.clone(), status)))
}

/// Always fail with `error`.
pub fn fail(error: StageError) -> BoxStage {
    sync_stage(move |_| Err(error.clone()))
}

/// Routes to a stage by HTTP method.
///
/// Methods without a stage fail with 405.
#[derive(Default, Clone)]
pub struct MethodMux {
    routes: HashMap<Method, BoxStage>,
}

impl MethodMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, method: Method, stage: BoxStage) -> Self {
        self.routes.insert(method, stage);
        self
    }

    pub fn get(self, stage: BoxStage) -> Self {
        self.on(Method::GET, stage)
    }

    pub fn post(self, stage: BoxStage) -> Self {
        self.on(Method::POST, stage)
    }

    pub fn put(self, stage: BoxStage) -> Self {
        self.on(Method::PUT, stage)
    }

    pub fn delete(self, stage: BoxStage) -> Self {
        self.on(Method::DELETE, stage)
    }

    pub fn into_stage(self) -> BoxStage {
        Arc::new(self)
    }
}

impl Stage for MethodMux {
    fn call<'a>(&'a self, req: &'a mut Request) -> BoxFuture<'a, StageResult> {
        match self.routes.get(req.method()) {
            Some(stage) => stage.call(req),
            None => Box::pin(std::future::ready(Err(StageError::method_not_allowed()))),
        }
    }
}

impl std::fmt::Debug for MethodMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.routes.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::dispatch::cancel::CancelSignal;
    use crate::http::request_id::RequestIdGenerator;
    use crate::session::{MemorySessionStore, SessionContext};
    use axum::body::Body;
    use std::time::Instant;

    fn request(method: Method) -> Request {
        let raw = axum::http::Request::builder()
            .method(method)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let session = SessionContext::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(SessionConfig::default()),
            None,
        );
        Request::new(
            RequestIdGenerator::new().unwrap().next(),
            Instant::now(),
            raw,
            1024,
            session,
            CancelSignal::never(),
        )
    }

    async fn status_of(stage: &BoxStage, method: Method) -> Result<StatusCode, StageError> {
        let mut req = request(method);
        match stage.call(&mut req).await? {
            Step::Respond(r) => Ok(r.status()),
            Step::Continue => Ok(StatusCode::CONTINUE),
        }
    }

    #[tokio::test]
    async fn simple_stages() {
        assert!(matches!(status_of(&pass(), Method::GET).await, Ok(StatusCode::CONTINUE)));
        assert_eq!(
            status_of(&respond(StatusCode::ACCEPTED, "ok"), Method::GET).await.unwrap(),
            StatusCode::ACCEPTED
        );
        assert_eq!(
            status_of(&redirect("/login", StatusCode::SEE_OTHER), Method::GET)
                .await
                .unwrap(),
            StatusCode::SEE_OTHER
        );
    }

    #[tokio::test]
    async fn fail_repeats_its_error() {
        let stage = fail(StageError::forbidden("nope"));
        for _ in 0..2 {
            let err = status_of(&stage, Method::GET).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
            assert_eq!(err.to_string(), "nope");
        }
    }

    #[tokio::test]
    async fn method_mux_routes_by_method() {
        let mux = MethodMux::new()
            .get(respond(StatusCode::OK, "read"))
            .post(respond(StatusCode::CREATED, "write"))
            .into_stage();

        assert_eq!(status_of(&mux, Method::GET).await.unwrap(), StatusCode::OK);
        assert_eq!(status_of(&mux, Method::POST).await.unwrap(), StatusCode::CREATED);

        let err = status_of(&mux, Method::PATCH).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.to_string(), "unsupported http method");
    }
}
