//! Per-request context handed to pipeline stages.
//!
//! # Responsibilities
//! - Carry the raw request parts, the request id and receipt time
//! - Expose route captures (positional args, named kwargs)
//! - Lazily buffer the body within the configured limit
//! - Own the request's session and cancellation signal
//!
//! # Design Decisions
//! - Created at ingress by the dispatcher, mutated only by the dispatcher and
//!   by stages, dropped after the response is logged
//! - Header/cookie/query lookups are borrowed views; nothing is parsed eagerly

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, HeaderMap, Method, StatusCode, Uri};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use crate::dispatch::cancel::CancelSignal;
use crate::error::StageError;
use crate::http::request_id::RequestId;
use crate::routing::RouteMatch;
use crate::session::SessionContext;

/// Cookie or query key whose presence marks a request as signed.
pub const CSRF_KEY: &str = "_din_csrf";

enum BodyState {
    Unread(Body),
    Read(Bytes),
}

/// The mutable context of one inbound request.
pub struct Request {
    id: RequestId,
    received: Instant,
    received_at: SystemTime,
    parts: Parts,
    /// Behind a mutex only so the request is `Sync`; never contended.
    body: Mutex<BodyState>,
    max_body_bytes: usize,
    route: Option<RouteMatch>,
    session: SessionContext,
    cancel: CancelSignal,
}

impl Request {
    pub(crate) fn new(
        id: RequestId,
        received: Instant,
        raw: axum::http::Request<Body>,
        max_body_bytes: usize,
        session: SessionContext,
        cancel: CancelSignal,
    ) -> Self {
        let (parts, body) = raw.into_parts();
        Self {
            id,
            received,
            received_at: SystemTime::now(),
            parts,
            body: Mutex::new(BodyState::Unread(body)),
            max_body_bytes,
            route: None,
            session,
            cancel,
        }
    }

    pub(crate) fn set_route(&mut self, route: RouteMatch) {
        self.route = Some(route);
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Monotonic receipt time.
    pub fn received(&self) -> Instant {
        self.received
    }

    /// Wall-clock receipt time.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    pub fn elapsed(&self) -> Duration {
        self.received.elapsed()
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The matched route, once the dispatcher has selected a pipeline.
    pub fn route(&self) -> Option<&RouteMatch> {
        self.route.as_ref()
    }

    /// Positional captures from the route pattern.
    pub fn args(&self) -> &[String] {
        self.route.as_ref().map(|m| m.args.as_slice()).unwrap_or(&[])
    }

    /// Named captures from the route pattern.
    pub fn kwargs(&self) -> Option<&HashMap<String, String>> {
        self.route.as_ref().map(|m| &m.kwargs)
    }

    pub fn kwarg(&self, name: &str) -> Option<&str> {
        self.kwargs()?.get(name).map(String::as_str)
    }

    /// A named capture that must be present.
    pub fn kwarg_required(&self, name: &str) -> Result<&str, StageError> {
        self.kwarg(name)
            .ok_or_else(|| StageError::missing_kwarg(name))
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        cookie_value(&self.parts.headers, name)
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query(&self, name: &str) -> Option<String> {
        query_value(self.parts.uri.query()?, name)
    }

    /// Integer query parameter within `[min, max]`. Optional parameters that
    /// are absent yield `min`.
    pub fn bounded_int(&self, name: &str, required: bool, min: i64, max: i64) -> Result<i64, StageError> {
        let raw = match self.query(name).filter(|v| !v.is_empty()) {
            Some(raw) => raw,
            None if required => {
                return Err(StageError::bad_request(format!(
                    "Missing required int parameter \"{}\"",
                    name
                )))
            }
            None => return Ok(min),
        };
        let value: i64 = raw.parse().map_err(|_| {
            StageError::bad_request(format!("{} parameter is not an integer", name))
        })?;
        if value < min || value > max {
            return Err(StageError::bad_request(format!(
                "{} parameter out of range. Min: {}, Max: {}",
                name, min, max
            )));
        }
        Ok(value)
    }

    /// True when a CSRF token is present as a cookie or query value.
    pub fn is_signed(&self) -> bool {
        self.cookie(CSRF_KEY).is_some() || self.query(CSRF_KEY).is_some_and(|v| !v.is_empty())
    }

    /// True when a TLS-terminating proxy set `X-Forwarded-Ssl: on`.
    pub fn using_ssl(&self) -> bool {
        self.header("x-forwarded-ssl") == Some("on")
    }

    /// Buffer and return the body. Later calls return the cached bytes.
    pub async fn body(&mut self) -> Result<Bytes, StageError> {
        let limit = self.max_body_bytes;
        let state = self.body.get_mut().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(state, BodyState::Read(Bytes::new())) {
            BodyState::Read(bytes) => {
                *state = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            BodyState::Unread(body) => {
                let bytes = axum::body::to_bytes(body, limit).await.map_err(|_| {
                    StageError::user_facing(StatusCode::PAYLOAD_TOO_LARGE, "request body too large")
                })?;
                *state = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
        }
    }

    /// Decode the body as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T, StageError> {
        let bytes = self.body().await?;
        serde_json::from_slice(&bytes).map_err(|_| StageError::bad_request("invalid json input"))
    }

    pub fn session(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub(crate) fn session_ref(&self) -> &SessionContext {
        &self.session
    }

    /// Raised when the dispatcher gives up on this request.
    pub fn cancellation(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Request-scoped log line.
    pub fn log(&self, msg: &str) {
        tracing::info!(request_id = %self.id, "{}", msg);
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// Value of cookie `name` in the `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}

fn query_value(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::http::request_id::RequestIdGenerator;
    use crate::session::MemorySessionStore;
    use std::sync::Arc;

    fn request(raw: axum::http::Request<Body>) -> Request {
        let session = SessionContext::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(SessionConfig::default()),
            None,
        );
        Request::new(
            RequestIdGenerator::new().unwrap().next(),
            Instant::now(),
            raw,
            16,
            session,
            CancelSignal::never(),
        )
    }

    fn get(uri: &str) -> Request {
        request(axum::http::Request::get(uri).body(Body::empty()).unwrap())
    }

    #[test]
    fn cookie_lookup() {
        let req = request(
            axum::http::Request::get("/")
                .header("cookie", "a=1; _din_session=abc; b=2")
                .body(Body::empty())
                .unwrap(),
        );
        assert_eq!(req.cookie("_din_session"), Some("abc"));
        assert_eq!(req.cookie("b"), Some("2"));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn bounded_int_rules() {
        let req = get("/items?limit=20&bad=x&big=500");
        assert_eq!(req.bounded_int("limit", true, 1, 100).unwrap(), 20);
        assert_eq!(req.bounded_int("absent", false, 1, 100).unwrap(), 1);
        assert!(req.bounded_int("absent", true, 1, 100).is_err());
        assert!(req.bounded_int("bad", true, 1, 100).is_err());
        let err = req.bounded_int("big", true, 1, 100).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn query_values_are_decoded() {
        let req = get("/q?name=hello%20world&a=b+c&empty");
        assert_eq!(req.query("name").as_deref(), Some("hello world"));
        assert_eq!(req.query("a").as_deref(), Some("b c"));
        assert_eq!(req.query("empty").as_deref(), Some(""));
        assert_eq!(req.query("missing"), None);
    }

    #[test]
    fn signed_and_ssl() {
        assert!(get("/?_din_csrf=t").is_signed());
        assert!(!get("/").is_signed());

        let req = request(
            axum::http::Request::get("/")
                .header("x-forwarded-ssl", "on")
                .body(Body::empty())
                .unwrap(),
        );
        assert!(req.using_ssl());
    }

    #[test]
    fn kwargs_absent_before_matching() {
        let req = get("/foo");
        assert!(req.args().is_empty());
        assert!(req.kwarg("id").is_none());
        assert_eq!(
            req.kwarg_required("id").unwrap_err().to_string(),
            "missing required kwarg id"
        );
    }

    #[tokio::test]
    async fn body_is_buffered_once_and_limited() {
        let mut req = request(
            axum::http::Request::post("/")
                .body(Body::from("{\"a\":1}"))
                .unwrap(),
        );
        assert_eq!(req.body().await.unwrap(), Bytes::from_static(b"{\"a\":1}"));
        let value: serde_json::Value = req.json().await.unwrap();
        assert_eq!(value["a"], 1);

        let mut big = request(
            axum::http::Request::post("/")
                .body(Body::from("x".repeat(64)))
                .unwrap(),
        );
        let err = big.body().await.unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
