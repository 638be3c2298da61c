//! Typed publish/subscribe dispatch.
//!
//! This module provides the **delivery engine**: components subscribe handlers
//! to event *shapes* (concrete event types, the interfaces they implement, the
//! ancestor events they embed) and publishers emit events that reach every
//! matching handler, in priority order, exactly once per publish call.
//!
//! ## Data Flow
//!
//! ```text
//! publish(event)
//!   ↓
//! 1. Lifecycle check (disposed → InvalidState, nothing runs)
//!   ↓
//! 2. Type closure (cached per concrete type)
//!   ↓
//! 3. Registry lookup, one snapshot per shape
//!   ↓
//! 4. Stable sort by priority (descending)
//!   ↓
//! 5. Delivery: sequential (`publish`) or fan-out (`publish_async`)
//!   ↓
//! 6. Optional auto-disposal
//! ```
//!
//! ## Delivery Modes
//!
//! - **Sequential** (`publish`): handlers run one after another on the calling
//!   thread. Disposal is re-checked before every handler; once the event is
//!   disposed (by an earlier handler or from outside) the remaining handlers
//!   are skipped.
//! - **Fan-out** (`publish_async`): one work unit per handler is submitted to
//!   the [`Executor`] in priority order. Completion order is unspecified. Each
//!   unit checks disposal right before invoking, which is a best-effort skip:
//!   a unit that passed its check may still run while another unit, or the
//!   final auto-dispose, disposes the event.
//!
//! ## Failure Containment
//!
//! Only `InvalidState` (publishing a disposed event) and `InvalidArgument`
//! (bad configuration) reach callers. A handler that returns `Err` or panics
//! never stops the publish or other handlers: sequential failures are logged
//! (and reported to the sink if configured), fan-out failures are collected
//! and reported to the [`DiagnosticSink`]. Failed handlers are not retried.
//!
//! ## Thread Safety
//!
//! `EventBus` is `Send + Sync`. Subscribing, unsubscribing and publishing may
//! happen concurrently from any thread; a publish works on registry snapshots
//! taken during resolution.

use std::sync::Arc;

use tracing::{debug, warn};

use shapebus_core::{DispatchResult, Priority};

use crate::config::BusConfig;
use crate::event::Event;
use crate::executor::{Executor, TokioExecutor, UnitHandle, UnitOutcome, WorkUnit};
use crate::fanout::{FanOut, FanOutReport};
use crate::handler::{Handler, HandlerResult};
use crate::registry::{SubscriberRegistry, Subscription};
use crate::resolve::{ResolvedHandler, resolve_handlers};
use crate::shape::{ClosureCache, ShapeKey};
use crate::sink::{DiagnosticSink, TracingSink};

/// In-process typed event bus.
///
/// ## Usage Pattern
///
/// ```ignore
/// let bus = EventBus::new();
///
/// let audit = bus.subscribe_fn::<dyn Auditable, _>(|a| audit_log(a), Priority::Level(5));
/// bus.subscribe_fn::<OrderPlaced, _>(|o| reserve_stock(o), Priority::Level(10));
///
/// // reserve_stock runs first, then audit_log; the event is disposed afterwards.
/// bus.publish(&OrderPlaced::new(42))?;
///
/// bus.unsubscribe(&audit);
/// ```
pub struct EventBus {
    config: BusConfig,
    registry: SubscriberRegistry,
    closures: ClosureCache,
    executor: Arc<dyn Executor>,
    sink: Arc<dyn DiagnosticSink>,
}

impl EventBus {
    /// Bus with default configuration, a [`TokioExecutor`] and a [`TracingSink`].
    pub fn new() -> Self {
        Self::from_parts(
            BusConfig::default(),
            Arc::new(TokioExecutor::new()),
            Arc::new(TracingSink),
        )
    }

    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    fn from_parts(
        config: BusConfig,
        executor: Arc<dyn Executor>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            config,
            registry: SubscriberRegistry::new(),
            closures: ClosureCache::new(),
            executor,
            sink,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Register `handler` for shape `S` (a concrete event, an interface such
    /// as `dyn Auditable`, or an ancestor event).
    pub fn subscribe<S>(&self, handler: Handler<S>, priority: impl Into<Priority>)
    where
        S: ?Sized + 'static,
    {
        let subscription = Subscription::new(handler, priority.into());
        debug!(
            bus = %self.config.name,
            shape = subscription.shape().name(),
            priority = %subscription.priority(),
            arity = ?subscription.arity(),
            "subscribe"
        );
        self.registry.insert(subscription);
    }

    /// Subscribe a closure that takes the event; returns the handler so it can
    /// be unsubscribed later.
    pub fn subscribe_fn<S, F>(&self, f: F, priority: impl Into<Priority>) -> Handler<S>
    where
        S: ?Sized + 'static,
        F: Fn(&S) -> HandlerResult + Send + Sync + 'static,
    {
        let handler = Handler::new(f);
        self.subscribe(handler.clone(), priority);
        handler
    }

    /// Subscribe a closure that takes nothing.
    pub fn subscribe_nullary<S, F>(&self, f: F, priority: impl Into<Priority>) -> Handler<S>
    where
        S: ?Sized + 'static,
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        let handler = Handler::nullary(f);
        self.subscribe(handler.clone(), priority);
        handler
    }

    /// Remove every subscription of `handler` for shape `S`.
    ///
    /// Returns how many were removed; unknown handlers are a no-op.
    pub fn unsubscribe<S>(&self, handler: &Handler<S>) -> usize
    where
        S: ?Sized + 'static,
    {
        let shape = ShapeKey::of::<S>();
        let removed = self.registry.remove(shape, |s| s.is_handler(handler));
        debug!(
            bus = %self.config.name,
            shape = shape.name(),
            removed,
            "unsubscribe"
        );
        removed
    }

    pub fn has_subscribers<S>(&self) -> bool
    where
        S: ?Sized + 'static,
    {
        self.registry.contains(ShapeKey::of::<S>())
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.subscription_count()
    }

    /// Drop every subscription (teardown).
    pub fn clear(&self) {
        self.registry.clear();
        debug!(bus = %self.config.name, "cleared all subscriptions");
    }

    /// Handlers `event` would reach, in invocation order (`None` if none).
    pub fn resolve<E: Event>(&self, event: &E) -> DispatchResult<Option<Vec<ResolvedHandler<E>>>> {
        resolve_handlers(&self.registry, &self.closures, event)
    }

    /// Deliver synchronously, disposing afterwards per [`BusConfig::auto_dispose`].
    pub fn publish<E: Event>(&self, event: &E) -> DispatchResult<bool> {
        self.publish_with(event, self.config.auto_dispose)
    }

    /// Deliver synchronously.
    ///
    /// Returns `Ok(false)` (without disposing) when no handler matches, and
    /// `Ok(true)` once every handler was attempted or skipped, regardless of
    /// individual handler outcomes.
    pub fn publish_with<E: Event>(&self, event: &E, auto_dispose: bool) -> DispatchResult<bool> {
        let Some(handlers) = self.resolve(event)? else {
            debug!(
                bus = %self.config.name,
                event_type = core::any::type_name::<E>(),
                event_id = %event.id(),
                "no handlers"
            );
            return Ok(false);
        };

        for (index, handler) in handlers.iter().enumerate() {
            if event.is_disposed() {
                debug!(
                    bus = %self.config.name,
                    event_id = %event.id(),
                    skipped = handlers.len() - index,
                    "event disposed mid-dispatch; skipping remaining handlers"
                );
                break;
            }

            if let Err(failure) = handler.invoke_guarded(event) {
                warn!(
                    bus = %self.config.name,
                    shape = failure.shape().name(),
                    event_id = %failure.event_id(),
                    error = %failure.kind(),
                    "handler failed; continuing"
                );
                if self.config.report_sync_failures {
                    self.sink.report(&failure);
                }
            }
        }

        if auto_dispose {
            event.dispose();
        }
        Ok(true)
    }

    /// Fan out concurrently, disposing afterwards per [`BusConfig::auto_dispose`].
    pub fn publish_async<E: Event>(&self, event: Arc<E>) -> DispatchResult<FanOut> {
        self.publish_async_with(event, self.config.auto_dispose)
    }

    /// Fan out one work unit per handler to the executor.
    ///
    /// Resolution happens before this returns, so a disposed event fails here
    /// and no unit is submitted. The returned [`FanOut`] completes once all
    /// units finished, failures were reported and auto-disposal ran.
    pub fn publish_async_with<E: Event>(
        &self,
        event: Arc<E>,
        auto_dispose: bool,
    ) -> DispatchResult<FanOut> {
        let Some(handlers) = self.resolve(event.as_ref())? else {
            debug!(
                bus = %self.config.name,
                event_type = core::any::type_name::<E>(),
                event_id = %event.id(),
                "no handlers"
            );
            return Ok(FanOut::completed());
        };

        let handles: Vec<UnitHandle> = handlers
            .into_iter()
            .map(|handler| self.executor.submit(work_unit(handler, event.clone())))
            .collect();

        let sink = self.sink.clone();
        let bus = self.config.name.clone();
        Ok(FanOut::new(async move {
            let mut report = FanOutReport {
                submitted: handles.len(),
                ..FanOutReport::default()
            };
            let mut failures = Vec::new();

            for handle in handles {
                match handle.await {
                    Ok(UnitOutcome::Invoked) => report.invoked += 1,
                    Ok(UnitOutcome::Skipped) => report.skipped += 1,
                    Err(failure) => failures.push(failure),
                }
            }

            report.failed = failures.len();
            for failure in &failures {
                sink.report(failure);
            }

            if auto_dispose {
                event.dispose();
            }

            debug!(
                bus = %bus,
                event_id = %event.id(),
                submitted = report.submitted,
                invoked = report.invoked,
                skipped = report.skipped,
                failed = report.failed,
                "fan-out complete"
            );
            report
        }))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("closures", &self.closures)
            .finish_non_exhaustive()
    }
}

fn work_unit<E: Event>(handler: ResolvedHandler<E>, event: Arc<E>) -> WorkUnit {
    WorkUnit::new(handler.shape(), event.id(), move || {
        if event.is_disposed() {
            return Ok(UnitOutcome::Skipped);
        }
        handler
            .invoke_guarded(event.as_ref())
            .map(|()| UnitOutcome::Invoked)
    })
}

/// Builder for an [`EventBus`] with a custom executor, sink or config.
#[derive(Default)]
pub struct EventBusBuilder {
    config: BusConfig,
    executor: Option<Arc<dyn Executor>>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl EventBusBuilder {
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Some(Arc::new(executor));
        self
    }

    pub fn sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Validate the configuration and build the bus.
    ///
    /// Without an explicit executor, a [`TokioExecutor`] honouring
    /// `max_concurrent_units` is used.
    pub fn build(self) -> DispatchResult<EventBus> {
        self.config.validate()?;

        let executor = match self.executor {
            Some(executor) => executor,
            None => {
                let mut executor = TokioExecutor::new();
                if let Some(max) = self.config.max_concurrent_units {
                    executor = executor.with_max_concurrent(max);
                }
                Arc::new(executor)
            }
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));

        Ok(EventBus::from_parts(self.config, executor, sink))
    }
}

impl core::fmt::Debug for EventBusBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("config", &self.config)
            .field("custom_executor", &self.executor.is_some())
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}
