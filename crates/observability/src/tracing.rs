//! JSON `tracing` subscriber.
//!
//! Dispatch diagnostics (subscribe/unsubscribe, skipped handlers, contained
//! handler failures) are emitted as structured events; this installs the
//! subscriber that renders them.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Install the subscriber, falling back to `default_directive` when `RUST_LOG`
/// does not yield a filter.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_default(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        ::tracing::debug!(default_directive, "tracing subscriber installed");
    }
    installed
}
