use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use repose_core::SemanticsId;
use thiserror::Error;

use crate::owner::LayerId;

/// Misuse of a [`Scene`](crate::Scene). These are programmer errors and are
/// always reported, never swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Scene is closed")]
    Closed,
    #[error("Scene is already closed")]
    AlreadyClosed,
    #[error("layer {0:?} is not attached to this scene")]
    UnknownLayer(LayerId),
    #[error("scene has no content")]
    NoContent,
    #[error(transparent)]
    Accessibility(#[from] AccessibilityQueryError),
}

/// Best-effort failures answering a host accessibility query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessibilityQueryError {
    #[error("accessibility query is not implemented")]
    NotImplemented,
    #[error("no accessibility element with id {0}")]
    UnknownElement(SemanticsId),
    #[error("accessibility is disabled for this owner")]
    Disabled,
}

/// A panic raised by user code the scene called into.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{origin} panicked: {message}")]
pub struct CallbackPanic {
    pub message: String,
    /// Which scene stage invoked the callback ("recompose", "command", ...).
    pub origin: &'static str,
}

impl CallbackPanic {
    pub(crate) fn from_payload(payload: &(dyn Any + Send), origin: &'static str) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic".to_string()
        };
        Self { message, origin }
    }
}

pub type ExceptionHandler = Rc<dyn Fn(&CallbackPanic)>;

/// Runs `f`, routing a panic to `handler`. Without a handler the panic
/// continues into the caller's frame.
pub(crate) fn run_guarded<R>(
    handler: Option<&ExceptionHandler>,
    origin: &'static str,
    f: impl FnOnce() -> R,
) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(payload) => {
            report_panic(handler, origin, payload);
            None
        }
    }
}

pub(crate) fn report_panic(
    handler: Option<&ExceptionHandler>,
    origin: &'static str,
    payload: Box<dyn Any + Send>,
) {
    match handler {
        Some(h) => {
            let info = CallbackPanic::from_payload(payload.as_ref(), origin);
            log::debug!("{info}");
            h(&info);
        }
        None => resume_unwind(payload),
    }
}
