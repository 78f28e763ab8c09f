//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! axum fallback handler
//!     → dispatcher.rs (id, select pipeline, spawn chain, race deadline)
//!     → recover.rs (panic boundary inside the chain task)
//!     → handlers.rs (render error / panic / not-found / timeout)
//!     → outcome.rs (terminal outcome tag, logged once)
//! ```

pub mod cancel;
pub mod dispatcher;
pub mod handlers;
pub mod outcome;
pub mod recover;

pub use cancel::{cancel_pair, CancelSignal, CancelTrigger};
pub use dispatcher::{Dispatched, Dispatcher, DispatcherBuilder, NoResponse};
pub use handlers::{
    default_error_handler, default_not_found_handler, default_panic_handler, json_panic_handler,
    ErrorHandler, NotFoundHandler, PanicHandler, RequestInfo, TIMEOUT_BODY,
};
pub use outcome::Outcome;
pub use recover::{Recovered, TraceFrame};
