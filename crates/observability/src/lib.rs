//! Process-wide logging setup for hosts embedding the event bus.

/// Install the JSON tracing subscriber (filter from `RUST_LOG`, default `info`).
///
/// Safe to call multiple times; only the first call installs anything.
pub fn init() {
    tracing::init_with_default(tracing::DEFAULT_DIRECTIVE);
}

/// Subscriber configuration.
pub mod tracing;
