//! Typed handler variants.
//!
//! A handler's arity is fixed when it is built: it either takes the event
//! (viewed as the subscribed shape `S`) or takes nothing. No reflection happens
//! at publish time; the bus just calls [`Handler::invoke`].

use std::sync::Arc;

/// What a handler returns. Errors (and panics) are contained by the bus.
pub type HandlerResult = anyhow::Result<()>;

type UnaryFn<S> = dyn Fn(&S) -> HandlerResult + Send + Sync;
type NullaryFn = dyn Fn() -> HandlerResult + Send + Sync;

/// Declared arity of a handler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Takes nothing.
    Nullary,
    /// Takes the event.
    Unary,
}

enum Callable<S: ?Sized> {
    Nullary(Arc<NullaryFn>),
    Unary(Arc<UnaryFn<S>>),
}

impl<S: ?Sized> Clone for Callable<S> {
    fn clone(&self) -> Self {
        match self {
            Callable::Nullary(f) => Callable::Nullary(f.clone()),
            Callable::Unary(f) => Callable::Unary(f.clone()),
        }
    }
}

/// A subscriber-supplied unit of behaviour for shape `S`.
///
/// Handlers are cheap to clone. Clones share identity: unsubscribing with any
/// clone removes every subscription made with any other clone.
pub struct Handler<S: ?Sized> {
    callable: Callable<S>,
}

impl<S: ?Sized> Handler<S> {
    /// A handler that receives the event.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&S) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callable: Callable::Unary(Arc::new(f)),
        }
    }

    /// A handler that only needs to know the event happened.
    pub fn nullary<F>(f: F) -> Self
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            callable: Callable::Nullary(Arc::new(f)),
        }
    }

    pub fn arity(&self) -> Arity {
        match self.callable {
            Callable::Nullary(_) => Arity::Nullary,
            Callable::Unary(_) => Arity::Unary,
        }
    }

    pub fn invoke(&self, event: &S) -> HandlerResult {
        match &self.callable {
            Callable::Nullary(f) => f(),
            Callable::Unary(f) => f(event),
        }
    }

    /// Identity comparison: true when both handlers wrap the same callable.
    pub fn same_as(&self, other: &Handler<S>) -> bool {
        self.identity() == other.identity()
    }

    // Thin data pointer only; vtable pointers are not stable across codegen units.
    fn identity(&self) -> *const () {
        match &self.callable {
            Callable::Nullary(f) => Arc::as_ptr(f) as *const (),
            Callable::Unary(f) => Arc::as_ptr(f) as *const (),
        }
    }
}

impl<S: ?Sized> Clone for Handler<S> {
    fn clone(&self) -> Self {
        Self {
            callable: self.callable.clone(),
        }
    }
}

impl<S: ?Sized> PartialEq for Handler<S> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<S: ?Sized> Eq for Handler<S> {}

impl<S: ?Sized> core::fmt::Debug for Handler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handler")
            .field("shape", &core::any::type_name::<S>())
            .field("arity", &self.arity())
            .finish()
    }
}
