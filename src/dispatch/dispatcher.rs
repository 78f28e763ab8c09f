//! Request dispatcher.
//!
//! # Lifecycle
//! ```text
//! Received ──select──▶ Unmatched ──▶ not-found handler ──────────────┐
//!    │                                                               │
//!    └──▶ Matched ──spawn chain──▶ Executing                         │
//!                                    ├─ Completed ─▶ render + session │
//!                                    ├─ Errored ───▶ error handler   ├─▶ Logged
//!                                    ├─ Recovered ─▶ panic handler   │
//!                                    └─ TimedOut ──▶ 504             │
//! ```
//!
//! # Design Decisions
//! - The chain runs in its own task; a panic there is caught at the task
//!   boundary and never reaches the connection task
//! - The supervisor waits on the task's join handle under a deadline; the
//!   handle is a single-use result slot, so exactly one outcome is acted on
//! - A result that is ready when the deadline also fires wins, because the
//!   handle is polled before the timer
//! - Session side effects apply on the Completed path only
//! - Exactly one `request finished` event per request

use axum::body::Body;
use axum::http::{header, HeaderValue};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ExecutionConfig, SessionConfig, TimeoutPolicy};
use crate::dispatch::cancel::{cancel_pair, CancelTrigger};
use crate::dispatch::handlers::{
    default_error_handler, default_not_found_handler, default_panic_handler,
    internal_error_response, timeout_response, ErrorHandler, NotFoundHandler, PanicHandler,
    RequestInfo,
};
use crate::dispatch::outcome::Outcome;
use crate::dispatch::recover::{catch_panic, install_panic_hook, Recovered};
use crate::error::StageError;
use crate::http::request::{cookie_value, Request};
use crate::http::request_id::{RequestIdError, RequestIdGenerator, X_REQUEST_ID};
use crate::http::response::{HttpResponse, Response};
use crate::observability::metrics;
use crate::pipeline::{run_chain, ChainResult};
use crate::routing::{Pipeline, PipelineRegistry};
use crate::session::{MemorySessionStore, SessionContext, SessionStore};

/// Every stage in a pipeline passed without answering.
#[derive(Debug, thiserror::Error)]
#[error("pipeline {0:?} produced no response")]
pub struct NoResponse(pub String);

/// A dispatched response and the outcome that produced it.
#[derive(Debug)]
pub struct Dispatched {
    pub response: HttpResponse,
    pub outcome: Outcome,
}

/// What the chain task hands back to the supervisor.
enum TaskResult {
    Finished(ChainResult, Request),
    Recovered(Recovered),
}

/// Matches requests to pipelines and supervises their execution.
pub struct Dispatcher {
    registry: Arc<PipelineRegistry>,
    ids: RequestIdGenerator,
    store: Arc<dyn SessionStore>,
    session: Arc<SessionConfig>,
    timeout: Duration,
    on_timeout: TimeoutPolicy,
    capture_backtrace: bool,
    max_body_bytes: usize,
    on_error: ErrorHandler,
    on_panic: PanicHandler,
    on_not_found: NotFoundHandler,
}

impl Dispatcher {
    pub fn builder(registry: PipelineRegistry) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    /// Execution budget for one stage chain.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Handle one request.
    pub async fn dispatch(&self, raw: axum::http::Request<Body>) -> HttpResponse {
        self.dispatch_with_outcome(raw).await.response
    }

    /// Handle one request, also reporting which terminal outcome was taken.
    pub async fn dispatch_with_outcome(&self, raw: axum::http::Request<Body>) -> Dispatched {
        let received = Instant::now();
        let id = self.ids.next();
        let info = RequestInfo {
            id,
            method: raw.method().clone(),
            uri: raw.uri().clone(),
            headers: raw.headers().clone(),
            received,
        };
        tracing::info!(
            request_id = %id,
            method = %info.method,
            uri = %info.uri,
            "request received"
        );

        let Some(route) = self.registry.select(&decoded_path(raw.uri().path())) else {
            let response = (self.on_not_found)(&info);
            return self.finish(&info, None, Outcome::NotFound, response);
        };

        let pipeline = Arc::clone(&route.pipeline);
        tracing::info!(request_id = %id, pipeline = %pipeline.name(), "pipeline selected");

        let inbound_key = cookie_value(raw.headers(), &self.session.cookie_name).map(str::to_string);
        let session = SessionContext::new(
            Arc::clone(&self.store),
            Arc::clone(&self.session),
            inbound_key,
        );
        let (trigger, signal) = cancel_pair();
        let mut req = Request::new(id, received, raw, self.max_body_bytes, session, signal);
        req.set_route(route);

        let (outcome, response) = self.execute(&info, Arc::clone(&pipeline), req, trigger).await;
        self.finish(&info, Some(pipeline.name()), outcome, response)
    }

    async fn execute(
        &self,
        info: &RequestInfo,
        pipeline: Arc<Pipeline>,
        mut req: Request,
        trigger: CancelTrigger,
    ) -> (Outcome, HttpResponse) {
        let capture = self.capture_backtrace;
        let mut handle = tokio::spawn(async move {
            let caught = catch_panic(run_chain(pipeline.stages(), &mut req), capture).await;
            match caught {
                Ok(result) => TaskResult::Finished(result, req),
                Err(recovered) => TaskResult::Recovered(recovered),
            }
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(TaskResult::Finished(result, req))) => self.conclude(info, result, req).await,
            Ok(Ok(TaskResult::Recovered(recovered))) => self.recovered(info, &recovered),
            Ok(Err(join_err)) if join_err.is_panic() => {
                let recovered = Recovered::from_payload(join_err.into_panic(), Vec::new());
                self.recovered(info, &recovered)
            }
            Ok(Err(join_err)) => {
                tracing::error!(request_id = %info.id, error = %join_err, "Stage task was cancelled");
                (Outcome::Errored, internal_error_response())
            }
            Err(_) => {
                match self.on_timeout {
                    TimeoutPolicy::Detach => {}
                    TimeoutPolicy::Cancel => trigger.cancel(),
                    TimeoutPolicy::Abort => {
                        trigger.cancel();
                        handle.abort();
                    }
                }
                tracing::warn!(
                    request_id = %info.id,
                    budget_ms = self.timeout.as_millis() as u64,
                    policy = ?self.on_timeout,
                    "request timed out"
                );
                (Outcome::TimedOut, timeout_response())
            }
        }
    }

    async fn conclude(
        &self,
        info: &RequestInfo,
        result: ChainResult,
        req: Request,
    ) -> (Outcome, HttpResponse) {
        match result {
            ChainResult::Responded(response) => self.completed(info, response, req).await,
            ChainResult::Failed(err) => self.errored(info, &err),
            ChainResult::Exhausted => {
                let name = req.route().map(|m| m.pipeline.name().to_string()).unwrap_or_default();
                self.errored(info, &StageError::opaque(NoResponse(name)))
            }
            // Only reachable once the deadline has already fired.
            ChainResult::Cancelled => (Outcome::TimedOut, timeout_response()),
        }
    }

    async fn completed(
        &self,
        info: &RequestInfo,
        response: Box<dyn Response>,
        req: Request,
    ) -> (Outcome, HttpResponse) {
        let mut rendered = match response.render() {
            Ok(rendered) => rendered,
            Err(err) => return self.errored(info, &StageError::opaque(err)),
        };

        let session = req.session_ref();
        let cookie = if session.issues_cookie() {
            session.issue_cookie()
        } else if session.was_cleared() {
            session.expire_cookie()
        } else {
            None
        };
        if let Some(cookie) = cookie {
            rendered.headers_mut().append(header::SET_COOKIE, cookie);
        }

        if session.needs_persist() {
            if let Err(err) = session.persist().await {
                tracing::warn!(request_id = %info.id, error = %err, "Failed to persist session");
                metrics::record_session_persist_failure();
            }
        }

        (Outcome::Completed, rendered)
    }

    fn errored(&self, info: &RequestInfo, err: &StageError) -> (Outcome, HttpResponse) {
        match err {
            StageError::UserFacing { status, .. } => {
                tracing::info!(request_id = %info.id, status = status.as_u16(), error = %err, "Stage returned an error");
            }
            StageError::Opaque(_) => {
                tracing::error!(request_id = %info.id, error = %err, "Stage failed");
            }
        }
        (Outcome::Errored, (self.on_error)(info, err))
    }

    fn recovered(&self, info: &RequestInfo, recovered: &Recovered) -> (Outcome, HttpResponse) {
        tracing::error!(
            request_id = %info.id,
            panic_message = %recovered.message,
            frames = recovered.trace.len(),
            "Stage panicked"
        );
        (Outcome::Recovered, (self.on_panic)(info, recovered))
    }

    fn finish(
        &self,
        info: &RequestInfo,
        pipeline: Option<&str>,
        outcome: Outcome,
        mut response: HttpResponse,
    ) -> Dispatched {
        if let Ok(value) = HeaderValue::from_str(&info.id.to_string()) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        let elapsed = info.received.elapsed();
        let status = response.status();
        let pipeline = pipeline.unwrap_or("");
        tracing::info!(
            request_id = %info.id,
            pipeline = pipeline,
            status = status.as_u16(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            outcome = outcome.as_str(),
            "request finished"
        );
        metrics::record_request(pipeline, outcome, status, elapsed);

        Dispatched { response, outcome }
    }
}

/// Percent-decoded request path. Paths that do not decode to UTF-8 are
/// matched as sent.
fn decoded_path(path: &str) -> Cow<'_, str> {
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pipelines", &self.registry.len())
            .field("timeout", &self.timeout)
            .field("on_timeout", &self.on_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    registry: PipelineRegistry,
    store: Option<Arc<dyn SessionStore>>,
    session: SessionConfig,
    timeout: Duration,
    on_timeout: TimeoutPolicy,
    capture_backtrace: bool,
    max_body_bytes: usize,
    on_error: Option<ErrorHandler>,
    on_panic: Option<PanicHandler>,
    on_not_found: Option<NotFoundHandler>,
}

impl DispatcherBuilder {
    fn new(registry: PipelineRegistry) -> Self {
        let execution = ExecutionConfig::default();
        Self {
            registry,
            store: None,
            session: SessionConfig::default(),
            timeout: Duration::from_secs(execution.timeout_secs),
            on_timeout: execution.on_timeout,
            capture_backtrace: execution.capture_backtrace,
            max_body_bytes: crate::config::ListenerConfig::default().max_body_bytes,
            on_error: None,
            on_panic: None,
            on_not_found: None,
        }
    }

    /// Apply execution settings: budget, timeout policy, trace capture.
    pub fn execution(mut self, execution: &ExecutionConfig) -> Self {
        self.timeout = Duration::from_secs(execution.timeout_secs);
        self.on_timeout = execution.on_timeout;
        self.capture_backtrace = execution.capture_backtrace;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_timeout(mut self, policy: TimeoutPolicy) -> Self {
        self.on_timeout = policy;
        self
    }

    pub fn capture_backtrace(mut self, enabled: bool) -> Self {
        self.capture_backtrace = enabled;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Session backend. Defaults to an in-process [`MemorySessionStore`].
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestInfo, &StageError) -> HttpResponse + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestInfo, &Recovered) -> HttpResponse + Send + Sync + 'static,
    {
        self.on_panic = Some(Arc::new(handler));
        self
    }

    pub fn not_found_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RequestInfo) -> HttpResponse + Send + Sync + 'static,
    {
        self.on_not_found = Some(Arc::new(handler));
        self
    }

    /// Build the dispatcher. Fails when request ids cannot be generated.
    pub fn build(self) -> Result<Dispatcher, RequestIdError> {
        let ids = RequestIdGenerator::new()?;
        if self.capture_backtrace {
            install_panic_hook();
        }

        Ok(Dispatcher {
            registry: Arc::new(self.registry),
            ids,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            session: Arc::new(self.session),
            timeout: self.timeout,
            on_timeout: self.on_timeout,
            capture_backtrace: self.capture_backtrace,
            max_body_bytes: self.max_body_bytes,
            on_error: self.on_error.unwrap_or_else(|| Arc::new(default_error_handler)),
            on_panic: self.on_panic.unwrap_or_else(|| Arc::new(default_panic_handler)),
            on_not_found: self
                .on_not_found
                .unwrap_or_else(|| Arc::new(default_not_found_handler)),
        })
    }
}
