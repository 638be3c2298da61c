//! Completion handle for concurrent fan-out publishes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Tally of one fan-out publish.
///
/// `submitted == invoked + skipped + failed` once the [`FanOut`] completes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutReport {
    pub submitted: usize,
    pub invoked: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Future that completes when every unit of a fan-out publish has finished,
/// failures have been reported and auto-disposal (if requested) has run.
///
/// Units are already running when this is returned; dropping it does not
/// cancel them, but skips the failure reporting and disposal step.
#[must_use = "await the fan-out to report failures and dispose the event"]
pub struct FanOut {
    inner: Pin<Box<dyn Future<Output = FanOutReport> + Send + 'static>>,
}

impl FanOut {
    pub(crate) fn new<F>(future: F) -> Self
    where
        F: Future<Output = FanOutReport> + Send + 'static,
    {
        Self {
            inner: Box::pin(future),
        }
    }

    /// A fan-out with no work: completes immediately with an empty report.
    pub(crate) fn completed() -> Self {
        Self::new(std::future::ready(FanOutReport::default()))
    }
}

impl Future for FanOut {
    type Output = FanOutReport;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl core::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FanOut").finish_non_exhaustive()
    }
}
