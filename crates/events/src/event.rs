//! Event identity and disposal lifecycle.
//!
//! Every event embeds an [`EventHeader`]: an immutable id, an immutable creation
//! timestamp and a one-way disposal flag. The flag is the only mutable state an
//! event carries, and it is atomic so concurrent handlers may read it freely.
//!
//! ```text
//! Active ──dispose()──▶ Disposed   (terminal; further dispose() calls are no-ops)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use shapebus_core::EventId;

use crate::shape::ShapeSet;

/// Identity, creation time and disposal state shared by every event.
#[derive(Debug)]
pub struct EventHeader {
    id: EventId,
    timestamp: DateTime<Utc>,
    disposed: AtomicBool,
}

impl EventHeader {
    pub fn new() -> Self {
        Self::with_identity(EventId::new(), Utc::now())
    }

    /// Build a header with explicit identity (deterministic tests, re-hydration).
    pub fn with_identity(id: EventId, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            timestamp,
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Flip the header to disposed.
    ///
    /// Returns `true` only for the single caller that performed the transition.
    pub fn mark_disposed(&self) -> bool {
        self.disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for EventHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// A value that can be published on an [`EventBus`](crate::EventBus).
///
/// Implementors only provide [`header`](Event::header); everything else has a
/// default. Override [`declare_shapes`](Event::declare_shapes) to make the event
/// reachable through interfaces or ancestor events, and [`release`](Event::release)
/// to free resources on disposal.
///
/// ```ignore
/// struct OrderPlaced {
///     header: EventHeader,
///     order_no: u64,
/// }
///
/// impl Event for OrderPlaced {
///     fn header(&self) -> &EventHeader {
///         &self.header
///     }
///
///     fn declare_shapes(shapes: &mut ShapeSet<Self>) {
///         shapes.implements::<dyn Auditable>();
///     }
/// }
/// ```
pub trait Event: Send + Sync + 'static {
    fn header(&self) -> &EventHeader;

    fn id(&self) -> EventId {
        self.header().id()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.header().timestamp()
    }

    fn is_disposed(&self) -> bool {
        self.header().is_disposed()
    }

    /// Transition to disposed. Only the first call has any effect.
    fn dispose(&self) {
        if self.header().mark_disposed() {
            self.release();
        }
    }

    /// Resource release hook; runs exactly once, from the first `dispose()`.
    fn release(&self) {}

    /// Declare the interfaces and ancestor events this type can be viewed as.
    fn declare_shapes(_shapes: &mut ShapeSet<Self>)
    where
        Self: Sized,
    {
    }
}
