//! Dispatch resolution: event → priority-ordered handlers.
//!
//! 1. A disposed event is rejected with `InvalidState`.
//! 2. The event's type closure is walked in order, collecting each matching
//!    registry slot once.
//! 3. Nothing collected means "no handlers" (not an error).
//! 4. The collected list is stable-sorted by descending priority, so equal
//!    priorities keep registration order, and across slots keep closure order.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use shapebus_core::{DispatchError, DispatchResult, Priority};

use crate::event::Event;
use crate::failure::HandlerFailure;
use crate::handler::{Arity, HandlerResult};
use crate::registry::SubscriberRegistry;
use crate::shape::{BoundHandler, ClosureCache, ShapeKey};

/// A subscription bound to a concrete event type, ready to invoke.
pub struct ResolvedHandler<E> {
    shape: ShapeKey,
    priority: Priority,
    arity: Arity,
    call: BoundHandler<E>,
}

impl<E: Event> ResolvedHandler<E> {
    pub fn shape(&self) -> ShapeKey {
        self.shape
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn invoke(&self, event: &E) -> HandlerResult {
        (self.call)(event)
    }

    /// Invoke, turning both `Err` returns and panics into a [`HandlerFailure`].
    pub fn invoke_guarded(&self, event: &E) -> Result<(), HandlerFailure> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.invoke(event))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(HandlerFailure::error(self.shape, event.id(), err)),
            Err(payload) => Err(HandlerFailure::panic(
                self.shape,
                event.id(),
                payload.as_ref(),
            )),
        }
    }
}

impl<E> Clone for ResolvedHandler<E> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape,
            priority: self.priority,
            arity: self.arity,
            call: self.call.clone(),
        }
    }
}

impl<E> core::fmt::Debug for ResolvedHandler<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("shape", &self.shape.name())
            .field("priority", &self.priority)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Resolve the handlers `event` should reach, in invocation order.
///
/// Returns `Ok(None)` when nothing matches.
pub fn resolve_handlers<E: Event>(
    registry: &SubscriberRegistry,
    closures: &ClosureCache,
    event: &E,
) -> DispatchResult<Option<Vec<ResolvedHandler<E>>>> {
    if event.is_disposed() {
        return Err(DispatchError::invalid_state(format!(
            "cannot publish disposed event {} ({})",
            event.id(),
            core::any::type_name::<E>()
        )));
    }

    let closure = closures.resolve(event);
    let mut visited = HashSet::with_capacity(closure.len());
    let mut working = Vec::new();

    for entry in closure.entries() {
        let shape = entry.key();
        if !visited.insert(shape) {
            continue;
        }
        let Some(subscriptions) = registry.snapshot(shape) else {
            continue;
        };
        for subscription in subscriptions.iter() {
            if let Some(call) = entry.bind(subscription.handler()) {
                working.push(ResolvedHandler {
                    shape,
                    priority: subscription.priority(),
                    arity: subscription.arity(),
                    call,
                });
            }
        }
    }

    if working.is_empty() {
        return Ok(None);
    }

    // `sort_by` is stable; ties keep collection order.
    working.sort_by(|a, b| b.priority.cmp(&a.priority));
    Ok(Some(working))
}
