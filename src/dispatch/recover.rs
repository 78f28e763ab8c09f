//! Panic recovery for stage chains.
//!
//! Panics are caught with `catch_unwind` at the boundary of the spawned
//! chain task. A process-wide panic hook, installed once and chained to the
//! previous hook, records a backtrace for panics raised while a chain is
//! being polled; other panics pass straight through to the previous hook.

use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

/// Frames kept in a recovered trace.
pub const MAX_TRACE_FRAMES: usize = 10;

static HOOK: Once = Once::new();

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

/// One frame of a recovered call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    pub name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl std::fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({}:{})", self.name, file, line),
            (Some(file), None) => write!(f, "{} ({})", self.name, file),
            _ => f.write_str(&self.name),
        }
    }
}

/// A caught panic from a stage chain.
#[derive(Debug, Clone, Serialize)]
pub struct Recovered {
    /// The panic payload, rendered as text.
    pub message: String,
    /// Call stack below the panic machinery; empty when capture is off.
    pub trace: Vec<TraceFrame>,
}

impl Recovered {
    pub fn from_payload(payload: Box<dyn Any + Send>, trace: Vec<TraceFrame>) -> Self {
        Self {
            message: payload_message(payload.as_ref()),
            trace,
        }
    }
}

/// Text of a panic payload.
pub fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Install the trace-recording panic hook. Idempotent.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(Cell::get) {
                LAST_TRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            }
            previous(info);
        }));
    });
}

/// Sets the capture flag for the duration of one poll.
struct CaptureGuard {
    previous: bool,
}

impl CaptureGuard {
    fn enter() -> Self {
        Self {
            previous: CAPTURING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.previous));
    }
}

/// Future wrapper that arms trace capture while its inner future is polled.
struct Traced<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Traced<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _guard = CaptureGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}

/// Run `fut`, converting a panic into [`Recovered`].
///
/// With `capture_trace` the panic hook must already be installed for a
/// trace to be recorded.
pub async fn catch_panic<F>(fut: F, capture_trace: bool) -> Result<F::Output, Recovered>
where
    F: Future,
{
    if !capture_trace {
        return AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .map_err(|payload| Recovered::from_payload(payload, Vec::new()));
    }

    LAST_TRACE.with(|slot| slot.borrow_mut().take());
    let traced = Traced {
        inner: Box::pin(fut),
    };
    match AssertUnwindSafe(traced).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => {
            let trace = LAST_TRACE
                .with(|slot| slot.borrow_mut().take())
                .map(|bt| parse_backtrace(&bt.to_string()))
                .unwrap_or_default();
            Err(Recovered::from_payload(payload, trace))
        }
    }
}

/// Frames belonging to the unwinding machinery or to this module.
fn is_machinery(name: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "std::",
        "core::",
        "alloc::",
        "<std::",
        "<core::",
        "<alloc::",
        "rust_begin_unwind",
        "__rust",
    ];
    PREFIXES.iter().any(|p| name.starts_with(p)) || name.contains("dispatch::recover::")
}

/// Parse `Backtrace`'s display output, dropping the leading panic
/// machinery and keeping at most [`MAX_TRACE_FRAMES`] frames.
pub fn parse_backtrace(text: &str) -> Vec<TraceFrame> {
    let mut frames: Vec<TraceFrame> = Vec::new();
    for line in text.lines().map(str::trim) {
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line) = split_location(location);
                frame.file = Some(file);
                frame.line = line;
            }
        } else if let Some((index, name)) = line.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(TraceFrame {
                    name: name.to_string(),
                    file: None,
                    line: None,
                });
            }
        }
    }

    frames
        .into_iter()
        .skip_while(|f| is_machinery(&f.name))
        .take(MAX_TRACE_FRAMES)
        .collect()
}

/// `path/to/file.rs:12:5` → (`path/to/file.rs`, `Some(12)`).
fn split_location(location: &str) -> (String, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let col = parts.next();
    let line = parts.next();
    let file = parts.next();
    match (file, line, col) {
        (Some(file), Some(line), Some(_)) => (file.to_string(), line.parse().ok()),
        _ => (location.to_string(), None),
    }
}
