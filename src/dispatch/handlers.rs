//! Callbacks that turn non-completed outcomes into responses.

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use std::sync::Arc;
use std::time::Instant;

use crate::dispatch::recover::Recovered;
use crate::error::StageError;
use crate::http::request_id::RequestId;
use crate::http::response::HttpResponse;

/// Body sent when the execution budget elapses.
pub const TIMEOUT_BODY: &str = "gateway timeout: request took too long";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Read-only view of a request, handed to outcome handlers.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub id: RequestId,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub received: Instant,
}

/// Renders a stage error.
pub type ErrorHandler = Arc<dyn Fn(&RequestInfo, &StageError) -> HttpResponse + Send + Sync>;

/// Renders a recovered panic.
pub type PanicHandler = Arc<dyn Fn(&RequestInfo, &Recovered) -> HttpResponse + Send + Sync>;

/// Renders an unmatched request.
pub type NotFoundHandler = Arc<dyn Fn(&RequestInfo) -> HttpResponse + Send + Sync>;

fn plaintext(status: StatusCode, body: String) -> HttpResponse {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

/// User-facing errors keep their status and message; anything else is a
/// bare 500.
pub fn default_error_handler(_: &RequestInfo, err: &StageError) -> HttpResponse {
    match err {
        StageError::UserFacing { status, message } => plaintext(*status, message.clone()),
        StageError::Opaque(_) => plaintext(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        ),
    }
}

/// 500 with the recovered value, followed by the trace when there is one.
pub fn default_panic_handler(_: &RequestInfo, recovered: &Recovered) -> HttpResponse {
    let mut body = recovered.message.clone();
    if !recovered.trace.is_empty() {
        body.push_str("\n\n");
        for frame in &recovered.trace {
            body.push_str(&frame.to_string());
            body.push('\n');
        }
    }
    plaintext(StatusCode::INTERNAL_SERVER_ERROR, body)
}

/// 500 with `{"recovered": .., "trace": [..]}`.
pub fn json_panic_handler(_: &RequestInfo, recovered: &Recovered) -> HttpResponse {
    let body = serde_json::json!({
        "recovered": recovered.message,
        "trace": recovered.trace,
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
}

pub fn default_not_found_handler(_: &RequestInfo) -> HttpResponse {
    plaintext(StatusCode::NOT_FOUND, "404".to_string())
}

pub(crate) fn timeout_response() -> HttpResponse {
    plaintext(StatusCode::GATEWAY_TIMEOUT, TIMEOUT_BODY.to_string())
}

pub(crate) fn internal_error_response() -> HttpResponse {
    plaintext(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::recover::TraceFrame;
    use crate::http::request_id::RequestIdGenerator;

    fn info() -> RequestInfo {
        RequestInfo {
            id: RequestIdGenerator::new().unwrap().next(),
            method: Method::GET,
            uri: Uri::from_static("/x"),
            headers: HeaderMap::new(),
            received: Instant::now(),
        }
    }

    async fn body_text(resp: HttpResponse) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn user_facing_error_keeps_status_and_message() {
        let resp = default_error_handler(&info(), &StageError::forbidden("go away"));
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_text(resp).await, "go away");
    }

    #[tokio::test]
    async fn opaque_error_hides_details() {
        let err = StageError::opaque(std::io::Error::other("db password leaked"));
        let resp = default_error_handler(&info(), &err);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(resp).await, "Internal Server Error");
    }

    #[tokio::test]
    async fn panic_handlers_render_recovered_value() {
        let recovered = Recovered {
            message: "boom".into(),
            trace: vec![TraceFrame {
                name: "app::explode".into(),
                file: Some("src/app.rs".into()),
                line: Some(3),
            }],
        };

        let text = body_text(default_panic_handler(&info(), &recovered)).await;
        assert!(text.starts_with("boom"));
        assert!(text.contains("app::explode (src/app.rs:3)"));

        let resp = json_panic_handler(&info(), &recovered);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["recovered"], "boom");
        assert_eq!(json["trace"][0]["line"], 3);
    }

    #[tokio::test]
    async fn not_found_and_timeout_bodies() {
        let resp = default_not_found_handler(&info());
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(resp).await, "404");

        let resp = timeout_response();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_text(resp).await, TIMEOUT_BODY);
    }
}
