//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, body limit, fallback handler)
//!     → request_id.rs (stamp the request)
//!     → request.rs (per-request context for stages)
//!     → response.rs (stage responses rendered to transport)
//!     → Send to client
//! ```

pub mod request;
pub mod request_id;
pub mod response;
pub mod server;

pub use request::Request;
pub use request_id::{RequestId, RequestIdGenerator, X_REQUEST_ID};
pub use response::{HttpResponse, Response};
pub use server::{listen, HttpServer, ServerError};
