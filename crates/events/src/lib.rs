//! In-process typed event dispatch.
//!
//! Components subscribe handlers to event *shapes* and publish events through
//! an [`EventBus`]. An event reaches the handlers registered for its concrete
//! type, for every interface it declares and for every ancestor event it
//! embeds, ordered by [`Priority`] (highest first, ties in registration order).
//!
//! ```ignore
//! struct OrderPlaced { header: EventHeader, order_id: u64 }
//!
//! impl Auditable for OrderPlaced {
//!     fn audit_line(&self) -> String { format!("order {}", self.order_id) }
//! }
//!
//! upcast!(OrderPlaced => dyn Auditable);
//!
//! impl Event for OrderPlaced {
//!     fn header(&self) -> &EventHeader { &self.header }
//!     fn declare_shapes(shapes: &mut ShapeSet<Self>) {
//!         shapes.implements::<dyn Auditable>();
//!     }
//! }
//!
//! let bus = EventBus::new();
//! bus.subscribe_fn::<dyn Auditable, _>(|a| record(a.audit_line()), 5);
//! bus.publish(&order)?;
//! ```

pub mod bus;
pub mod config;
pub mod event;
pub mod executor;
pub mod failure;
pub mod fanout;
pub mod handler;
pub mod registry;
pub mod resolve;
pub mod shape;
pub mod sink;

pub use bus::{EventBus, EventBusBuilder};
pub use config::BusConfig;
pub use event::{Event, EventHeader};
pub use executor::{
    Executor, InlineExecutor, TokioExecutor, UnitHandle, UnitOutcome, UnitResult, WorkUnit,
};
pub use failure::{FailureKind, HandlerFailure};
pub use fanout::{FanOut, FanOutReport};
pub use handler::{Arity, Handler, HandlerResult};
pub use registry::{SubscriberRegistry, Subscription};
pub use resolve::{ResolvedHandler, resolve_handlers};
pub use shape::{ClosureCache, ShapeEntry, ShapeKey, ShapeSet, TypeClosure, Upcast};
pub use sink::{DiagnosticSink, MemorySink, ReportedFailure, TracingSink};

pub use shapebus_core::{DispatchError, DispatchResult, EventId, Priority};
