//! Handler-level failures.
//!
//! These never reach a publisher as errors. Synchronous publishes log them
//! (and optionally forward them to the diagnostic sink); fan-out publishes
//! always forward them to the sink.

use std::any::Any;

use thiserror::Error;

use shapebus_core::EventId;

use crate::shape::ShapeKey;

/// What went wrong inside a handler invocation.
#[derive(Debug, Error)]
pub enum FailureKind {
    /// The handler returned `Err`.
    #[error("handler returned an error: {0:#}")]
    Error(anyhow::Error),

    /// The handler panicked; the payload message is kept when it is a string.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// The executor could not run the work unit to completion.
    #[error("work unit aborted: {0}")]
    Aborted(String),
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Error(_) => "error",
            FailureKind::Panic(_) => "panic",
            FailureKind::Aborted(_) => "aborted",
        }
    }
}

/// A failure attributed to one handler invocation for one event.
#[derive(Debug, Error)]
#[error("handler for `{shape}` failed on event {event_id}: {kind}")]
pub struct HandlerFailure {
    shape: ShapeKey,
    event_id: EventId,
    kind: FailureKind,
}

impl HandlerFailure {
    pub fn new(shape: ShapeKey, event_id: EventId, kind: FailureKind) -> Self {
        Self {
            shape,
            event_id,
            kind,
        }
    }

    pub fn error(shape: ShapeKey, event_id: EventId, err: anyhow::Error) -> Self {
        Self::new(shape, event_id, FailureKind::Error(err))
    }

    pub fn panic(shape: ShapeKey, event_id: EventId, payload: &(dyn Any + Send)) -> Self {
        Self::new(shape, event_id, FailureKind::Panic(panic_message(payload)))
    }

    pub fn aborted(shape: ShapeKey, event_id: EventId, reason: impl Into<String>) -> Self {
        Self::new(shape, event_id, FailureKind::Aborted(reason.into()))
    }

    pub fn shape(&self) -> ShapeKey {
        self.shape
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
