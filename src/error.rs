//! Centralized error handling for user-supplied callbacks.
//!
//! Nothing in this core is fatal: resolution failures fall back to literal
//! tags, invalid bindings are skipped, and stale-target races are ignored.
//! The one place user code runs synchronously inside the renderer - callback
//! style template refs - is isolated here so a panicking callback reaches the
//! host's error handler instead of unwinding through a render pass.

use std::cell::RefCell;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

/// Tags identifying where a routed error came from, so host error
/// boundaries can intercept by origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// A callback-style template ref.
    FunctionRef,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::FunctionRef => f.write_str("function ref"),
        }
    }
}

/// Error routed to the host handler.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} callback panicked: {message}")]
pub struct RenderError {
    pub code: ErrorCode,
    pub message: String,
}

/// Host-installable error handler.
pub type ErrorHandler = Rc<dyn Fn(&RenderError)>;

thread_local! {
    static HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
}

/// Install a handler for routed errors. Replaces any previous handler.
pub fn set_error_handler(handler: ErrorHandler) {
    HANDLER.with(|slot| *slot.borrow_mut() = Some(handler));
}

/// Remove the installed handler (for testing).
pub fn clear_error_handler() {
    HANDLER.with(|slot| *slot.borrow_mut() = None);
}

fn handle_error(err: RenderError) {
    let handler = HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&err),
        None => tracing::error!("{err}"),
    }
}

/// Run a user callback, routing a panic to the installed handler tagged
/// with `code`. The renderer itself carries no try/catch logic beyond this.
pub fn call_with_error_handling(f: impl FnOnce(), code: ErrorCode) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        handle_error(RenderError { code, message });
    }
}
