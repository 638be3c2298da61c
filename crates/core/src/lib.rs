//! Primitives shared by the dispatcher crates.
//!
//! This crate contains no dispatch logic; it only defines identity, ordering
//! and the caller-visible error model.

pub mod error;
pub mod id;
pub mod priority;

pub use error::{DispatchError, DispatchResult};
pub use id::EventId;
pub use priority::Priority;
