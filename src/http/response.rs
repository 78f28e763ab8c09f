//! Responses produced by pipeline stages.
//!
//! # Responsibilities
//! - Define the capability every stage response shares: report a status,
//!   render into a transport response
//! - Provide the common variants (empty, plaintext, redirect, created,
//!   JSON, upstream passthrough)
//!
//! # Design Decisions
//! - Rendering consumes the response (`self: Box<Self>`), so streaming
//!   bodies move straight into the transport
//! - Rendering may fail; the dispatcher logs the failure and answers 500

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use serde::Serialize;
use std::fmt;

/// Transport-level response type.
pub type HttpResponse = axum::response::Response;

/// Error raised while rendering a response.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid header value for {name}: {value:?}")]
    InvalidHeader { name: &'static str, value: String },
    #[error("failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to build response: {0}")]
    Http(#[from] axum::http::Error),
}

/// Anything a stage can answer a request with.
pub trait Response: Send + 'static {
    /// Status code this response will be rendered with.
    fn status(&self) -> StatusCode;

    /// Convert into a transport response.
    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError>;
}

impl fmt::Debug for dyn Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, RenderError> {
    HeaderValue::from_str(value).map_err(|_| RenderError::InvalidHeader {
        name,
        value: value.to_string(),
    })
}

/// A status code with no body.
#[derive(Debug, Clone, Copy)]
pub struct EmptyResponse {
    status: StatusCode,
}

impl EmptyResponse {
    pub fn new(status: StatusCode) -> Self {
        Self { status }
    }
}

impl Response for EmptyResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError> {
        Ok(axum::http::Response::builder()
            .status(self.status)
            .body(Body::empty())?)
    }
}

/// A `text/plain` body.
#[derive(Debug, Clone)]
pub struct PlaintextResponse {
    body: String,
    status: StatusCode,
}

impl PlaintextResponse {
    pub fn new(body: impl Into<String>, status: StatusCode) -> Self {
        Self {
            body: body.into(),
            status,
        }
    }

    /// Plaintext with status 200.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(body, StatusCode::OK)
    }
}

impl Response for PlaintextResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError> {
        Ok(axum::http::Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(self.body))?)
    }
}

/// Redirect to another location.
#[derive(Debug, Clone)]
pub struct Redirect {
    location: String,
    status: StatusCode,
}

impl Redirect {
    pub fn new(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            location: location.into(),
            status,
        }
    }

    pub fn found(location: impl Into<String>) -> Self {
        Self::new(location, StatusCode::FOUND)
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Response for Redirect {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError> {
        let location = header_value("location", &self.location)?;
        Ok(axum::http::Response::builder()
            .status(self.status)
            .header(header::LOCATION, location)
            .body(Body::empty())?)
    }
}

/// `201 Created`, optionally with a location and body.
#[derive(Debug, Clone, Default)]
pub struct Created {
    location: Option<String>,
    content_type: Option<String>,
    body: Option<Bytes>,
}

impl Created {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }
}

impl Response for Created {
    fn status(&self) -> StatusCode {
        StatusCode::CREATED
    }

    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError> {
        let mut builder = axum::http::Response::builder().status(StatusCode::CREATED);
        if let Some(location) = &self.location {
            builder = builder.header(header::LOCATION, header_value("location", location)?);
        }
        if let Some(content_type) = &self.content_type {
            builder = builder.header(
                header::CONTENT_TYPE,
                header_value("content-type", content_type)?,
            );
        }
        let body = self.body.map(Body::from).unwrap_or_else(Body::empty);
        Ok(builder.body(body)?)
    }
}

/// A serialized JSON body.
#[derive(Debug, Clone)]
pub struct JsonResponse<T> {
    value: T,
    status: StatusCode,
}

impl<T: Serialize + Send + 'static> JsonResponse<T> {
    pub fn new(value: T, status: StatusCode) -> Self {
        Self { value, status }
    }

    pub fn ok(value: T) -> Self {
        Self::new(value, StatusCode::OK)
    }
}

impl<T: Serialize + Send + 'static> Response for JsonResponse<T> {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError> {
        let body = serde_json::to_vec(&self.value)?;
        Ok(axum::http::Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))?)
    }
}

/// Passes an upstream response through unchanged: status, headers and body.
pub struct ProxyResponse {
    inner: axum::http::Response<Body>,
}

impl ProxyResponse {
    pub fn new(inner: axum::http::Response<Body>) -> Self {
        Self { inner }
    }
}

impl Response for ProxyResponse {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn render(self: Box<Self>) -> Result<HttpResponse, RenderError> {
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(res: HttpResponse) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn plaintext_sets_content_type() {
        let res = Box::new(PlaintextResponse::ok("hello")).render().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(res).await, "hello");
    }

    #[tokio::test]
    async fn redirect_sets_location() {
        let res = Box::new(Redirect::new("/login", StatusCode::SEE_OTHER))
            .render()
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn redirect_rejects_bad_location() {
        let err = Box::new(Redirect::found("/bad\nlocation")).render().unwrap_err();
        assert!(matches!(err, RenderError::InvalidHeader { name: "location", .. }));
    }

    #[tokio::test]
    async fn created_with_body() {
        let created = Created::new()
            .location("/items/7")
            .body("application/json", r#"{"id":7}"#);
        assert_eq!(created.status(), StatusCode::CREATED);
        let res = Box::new(created).render().unwrap();
        assert_eq!(res.headers()[header::LOCATION], "/items/7");
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_string(res).await, r#"{"id":7}"#);
    }

    #[tokio::test]
    async fn json_response_serializes() {
        let res = Box::new(JsonResponse::ok(serde_json::json!({"a": 1})))
            .render()
            .unwrap();
        assert_eq!(body_string(res).await, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn proxy_passes_through() {
        let upstream = axum::http::Response::builder()
            .status(StatusCode::ACCEPTED)
            .header("x-upstream", "yes")
            .body(Body::from("upstream body"))
            .unwrap();
        let proxied = ProxyResponse::new(upstream);
        assert_eq!(proxied.status(), StatusCode::ACCEPTED);
        let res = Box::new(proxied).render().unwrap();
        assert_eq!(res.headers()["x-upstream"], "yes");
        assert_eq!(body_string(res).await, "upstream body");
    }
}
