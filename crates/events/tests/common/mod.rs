#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use shapebus_events::{Event, EventHeader, ShapeSet, upcast};

pub trait Auditable: Send + Sync {
    fn audit_line(&self) -> String;
}

/// Concrete event implementing one interface.
pub struct Order {
    header: EventHeader,
    pub number: u32,
    pub releases: AtomicUsize,
}

impl Order {
    pub fn new(number: u32) -> Self {
        Self {
            header: EventHeader::new(),
            number,
            releases: AtomicUsize::new(0),
        }
    }
}

impl Auditable for Order {
    fn audit_line(&self) -> String {
        format!("order #{}", self.number)
    }
}

upcast!(Order => dyn Auditable);

impl Event for Order {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn declare_shapes(shapes: &mut ShapeSet<Self>) {
        shapes.implements::<dyn Auditable>();
    }
}

/// Event with no declared shapes.
pub struct Ping {
    header: EventHeader,
}

impl Ping {
    pub fn new() -> Self {
        Self {
            header: EventHeader::new(),
        }
    }
}

impl Event for Ping {
    fn header(&self) -> &EventHeader {
        &self.header
    }
}

/// Base event other events embed.
pub struct DomainEvent {
    header: EventHeader,
    pub source: &'static str,
}

impl DomainEvent {
    pub fn new(source: &'static str) -> Self {
        Self {
            header: EventHeader::new(),
            source,
        }
    }
}

impl Auditable for DomainEvent {
    fn audit_line(&self) -> String {
        format!("domain event from {}", self.source)
    }
}

upcast!(DomainEvent => dyn Auditable);

impl Event for DomainEvent {
    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn declare_shapes(shapes: &mut ShapeSet<Self>) {
        shapes.implements::<dyn Auditable>();
    }
}

/// Derived event: shares its lifecycle with the embedded [`DomainEvent`].
pub struct RushOrder {
    pub base: DomainEvent,
    pub deadline_hours: u32,
}

impl RushOrder {
    pub fn new(deadline_hours: u32) -> Self {
        Self {
            base: DomainEvent::new("warehouse"),
            deadline_hours,
        }
    }
}

upcast!(RushOrder => DomainEvent: base);

impl Event for RushOrder {
    fn header(&self) -> &EventHeader {
        self.base.header()
    }

    fn declare_shapes(shapes: &mut ShapeSet<Self>) {
        shapes.extends::<DomainEvent>();
    }
}

/// Shared, ordered record of handler invocations.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn sorted(&self) -> Vec<String> {
        let mut entries = self.entries();
        entries.sort();
        entries
    }
}
