//! Subscriber registry: shape → ordered subscriptions.
//!
//! The registry is the only shared mutable state in the dispatcher. Each slot
//! holds an immutable snapshot (`Arc<[Subscription]>`). Writers build a new
//! snapshot and swap it in under the write lock, so a dispatch that already
//! cloned a snapshot is never affected by a concurrent subscribe/unsubscribe,
//! and two writers on the same slot can never lose each other's update.
//!
//! Invariants:
//! - insertion order within a slot is preserved until an explicit removal
//! - a slot with zero subscriptions does not exist

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shapebus_core::Priority;

use crate::handler::{Arity, Handler};
use crate::shape::ShapeKey;

/// A type-erased `Handler<S>`; the shape entry that binds it knows `S`.
pub(crate) type ErasedHandler = Arc<dyn Any + Send + Sync>;

/// One registered (handler, priority, arity) triple.
#[derive(Clone)]
pub struct Subscription {
    shape: ShapeKey,
    priority: Priority,
    arity: Arity,
    handler: ErasedHandler,
}

impl Subscription {
    pub fn new<S: ?Sized + 'static>(handler: Handler<S>, priority: Priority) -> Self {
        Self {
            shape: ShapeKey::of::<S>(),
            priority,
            arity: handler.arity(),
            handler: Arc::new(handler),
        }
    }

    pub fn shape(&self) -> ShapeKey {
        self.shape
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// True when this subscription was made with `handler` (or a clone of it).
    pub fn is_handler<S: ?Sized + 'static>(&self, handler: &Handler<S>) -> bool {
        self.handler
            .downcast_ref::<Handler<S>>()
            .is_some_and(|h| h.same_as(handler))
    }

    pub(crate) fn handler(&self) -> &ErasedHandler {
        &self.handler
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("shape", &self.shape.name())
            .field("priority", &self.priority)
            .field("arity", &self.arity)
            .finish()
    }
}

#[derive(Debug)]
struct Slot {
    shape: ShapeKey,
    subscriptions: Arc<[Subscription]>,
}

/// Concurrent shape → subscriptions map.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // No handler ever runs while these locks are held, so a poisoned lock still
    // guards a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Slot>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Slot>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a subscription to its shape's slot, creating the slot if absent.
    pub fn insert(&self, subscription: Subscription) {
        let shape = subscription.shape();
        let mut slots = self.write();
        match slots.entry(shape.id()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                let mut next = Vec::with_capacity(slot.subscriptions.len() + 1);
                next.extend(slot.subscriptions.iter().cloned());
                next.push(subscription);
                slot.subscriptions = next.into();
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    shape,
                    subscriptions: Arc::from(vec![subscription]),
                });
            }
        }
    }

    /// Remove every subscription in `shape`'s slot that `matches`.
    ///
    /// Returns the number removed; removing from an unknown slot is a no-op.
    pub fn remove<F>(&self, shape: ShapeKey, matches: F) -> usize
    where
        F: Fn(&Subscription) -> bool,
    {
        let mut slots = self.write();
        let Some(slot) = slots.get_mut(&shape.id()) else {
            return 0;
        };

        let kept: Vec<Subscription> = slot
            .subscriptions
            .iter()
            .filter(|s| !matches(*s))
            .cloned()
            .collect();
        let removed = slot.subscriptions.len() - kept.len();

        if kept.is_empty() {
            slots.remove(&shape.id());
        } else if removed > 0 {
            slot.subscriptions = kept.into();
        }
        removed
    }

    /// Current subscriptions for `shape`, in registration order.
    pub fn snapshot(&self, shape: ShapeKey) -> Option<Arc<[Subscription]>> {
        self.read()
            .get(&shape.id())
            .map(|slot| slot.subscriptions.clone())
    }

    pub fn contains(&self, shape: ShapeKey) -> bool {
        self.read().contains_key(&shape.id())
    }

    /// Shapes that currently have at least one subscription.
    pub fn shapes(&self) -> Vec<ShapeKey> {
        self.read().values().map(|slot| slot.shape).collect()
    }

    pub fn shape_count(&self) -> usize {
        self.read().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.read()
            .values()
            .map(|slot| slot.subscriptions.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        self.write().clear();
    }
}
