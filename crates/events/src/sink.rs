//! Diagnostic sink boundary.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use shapebus_core::EventId;

use crate::failure::HandlerFailure;
use crate::shape::ShapeKey;

/// Receives handler failures the dispatcher contained.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, failure: &HandlerFailure);
}

impl<S> DiagnosticSink for Arc<S>
where
    S: DiagnosticSink + ?Sized,
{
    fn report(&self, failure: &HandlerFailure) {
        (**self).report(failure)
    }
}

/// Default sink: one structured `error` event per failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, failure: &HandlerFailure) {
        error!(
            shape = failure.shape().name(),
            event_id = %failure.event_id(),
            kind = failure.kind().label(),
            error = %failure.kind(),
            "event handler failed"
        );
    }
}

/// A failure as recorded by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedFailure {
    pub shape: ShapeKey,
    pub event_id: EventId,
    pub kind: &'static str,
    pub message: String,
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct MemorySink {
    reported: Mutex<Vec<ReportedFailure>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> Vec<ReportedFailure> {
        self.reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, failure: &HandlerFailure) {
        let record = ReportedFailure {
            shape: failure.shape(),
            event_id: failure.event_id(),
            kind: failure.kind().label(),
            message: failure.kind().to_string(),
        };
        self.reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    #[test]
    fn memory_sink_records_failures_in_order() {
        let sink = MemorySink::new();
        let id = EventId::new();
        sink.report(&HandlerFailure::error(
            ShapeKey::of::<Ping>(),
            id,
            anyhow::anyhow!("disk full"),
        ));
        sink.report(&HandlerFailure::aborted(ShapeKey::of::<Ping>(), id, "cancelled"));

        let reported = sink.reported();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].kind, "error");
        assert!(reported[0].message.contains("disk full"));
        assert_eq!(reported[1].kind, "aborted");
        assert_eq!(reported[1].shape, ShapeKey::of::<Ping>());
        assert_eq!(reported[1].event_id, id);
    }

    #[test]
    fn shared_sink_reports_through_arc() {
        let sink = Arc::new(MemorySink::new());
        let shared: Arc<dyn DiagnosticSink> = sink.clone();
        shared.report(&HandlerFailure::aborted(
            ShapeKey::of::<Ping>(),
            EventId::new(),
            "no runtime",
        ));
        assert_eq!(sink.len(), 1);
        TracingSink.report(&HandlerFailure::aborted(
            ShapeKey::of::<Ping>(),
            EventId::new(),
            "no runtime",
        ));
    }
}
