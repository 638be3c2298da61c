//! Caller-visible error model.

use thiserror::Error;

/// Result type used across the dispatcher API.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Dispatcher-level error.
///
/// Only these conditions ever reach a caller. Failures raised by handlers are
/// contained inside the dispatcher and never surface through this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// An input was rejected before any work happened (e.g. invalid bus configuration).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state (e.g. publishing a disposed event).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl DispatchError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }
}
