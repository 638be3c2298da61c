//! Type closure resolution.
//!
//! Rust has no runtime inheritance, so an event spells out the shapes it can
//! be viewed as: interfaces (usually trait objects such as `dyn Auditable`)
//! and ancestor events it embeds. [`Upcast`] provides the typed view, and
//! [`ShapeSet`] collects the declarations from [`Event::declare_shapes`].
//!
//! The resulting [`TypeClosure`] is ordered:
//!
//! ```text
//! [concrete type] ++ [interfaces, direct then inherited] ++ [ancestors, nearest first]
//! ```
//!
//! Closures only depend on the concrete type, so [`ClosureCache`] builds each
//! one once and hands out shared copies afterwards.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::event::Event;
use crate::handler::{Handler, HandlerResult};
use crate::registry::ErasedHandler;

/// View `self` as shape `S`.
///
/// Every type trivially views itself. Interface views are usually written with
/// [`upcast!`](crate::upcast); ancestor views return the embedded parent.
pub trait Upcast<S: ?Sized> {
    fn upcast(&self) -> &S;
}

impl<T: ?Sized> Upcast<T> for T {
    fn upcast(&self) -> &T {
        self
    }
}

/// Implement [`Upcast`] for the common cases.
///
/// ```ignore
/// // Trait-object interfaces:
/// upcast!(OrderPlaced => dyn Auditable, dyn Billable);
/// // An embedded ancestor event, reached through a field:
/// upcast!(OrderPlaced => DomainEvent: base);
/// ```
#[macro_export]
macro_rules! upcast {
    ($event:ty => $(dyn $iface:path),+ $(,)?) => {
        $(
            impl $crate::Upcast<dyn $iface> for $event {
                fn upcast(&self) -> &(dyn $iface + 'static) {
                    self
                }
            }
        )+
    };
    ($event:ty => $parent:ty : $field:ident) => {
        impl $crate::Upcast<$parent> for $event {
            fn upcast(&self) -> &$parent {
                &self.$field
            }
        }
    };
}

/// Identity of a subscribable shape.
#[derive(Debug, Copy, Clone)]
pub struct ShapeKey {
    id: TypeId,
    name: &'static str,
}

impl ShapeKey {
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: core::any::type_name::<S>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ShapeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ShapeKey {}

impl core::hash::Hash for ShapeKey {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl core::fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}

/// A handler bound to a concrete event type.
pub(crate) type BoundHandler<E> = Arc<dyn Fn(&E) -> HandlerResult + Send + Sync>;

type Binder<E> = Arc<dyn Fn(&ErasedHandler) -> Option<BoundHandler<E>> + Send + Sync>;

/// One shape in a closure, able to turn a stored handler for that shape into
/// a handler for the concrete event `E`.
pub struct ShapeEntry<E> {
    key: ShapeKey,
    bind: Binder<E>,
}

impl<E: 'static> ShapeEntry<E> {
    fn direct<S>() -> Self
    where
        S: ?Sized + 'static,
        E: Upcast<S>,
    {
        Self {
            key: ShapeKey::of::<S>(),
            bind: Arc::new(|erased: &ErasedHandler| {
                let handler = erased.downcast_ref::<Handler<S>>()?.clone();
                let bound: BoundHandler<E> =
                    Arc::new(move |event: &E| handler.invoke(<E as Upcast<S>>::upcast(event)));
                Some(bound)
            }),
        }
    }

    /// Re-target an entry of a parent event `E` at a child event `C` that embeds it.
    fn lift<C>(self) -> ShapeEntry<C>
    where
        C: Upcast<E> + 'static,
    {
        let parent_bind = self.bind;
        ShapeEntry {
            key: self.key,
            bind: Arc::new(move |erased: &ErasedHandler| {
                let inner = parent_bind(erased)?;
                let bound: BoundHandler<C> =
                    Arc::new(move |event: &C| inner(<C as Upcast<E>>::upcast(event)));
                Some(bound)
            }),
        }
    }

    pub fn key(&self) -> ShapeKey {
        self.key
    }

    /// Bind a stored handler. `None` if the handler was stored for another shape.
    pub(crate) fn bind(&self, handler: &ErasedHandler) -> Option<BoundHandler<E>> {
        (self.bind)(handler)
    }
}

/// Builder passed to [`Event::declare_shapes`].
pub struct ShapeSet<E> {
    interfaces: Vec<ShapeEntry<E>>,
    ancestors: Vec<ShapeEntry<E>>,
}

impl<E: Event> ShapeSet<E> {
    fn new() -> Self {
        Self {
            interfaces: Vec::new(),
            ancestors: Vec::new(),
        }
    }

    /// Declare an interface `I` that `E` satisfies.
    ///
    /// Supertraits are not followed: for `trait Auditable: Tracked`, declaring
    /// `dyn Auditable` does not make the event reach `dyn Tracked` handlers.
    /// Declare each trait object separately, each with its own `upcast!`.
    /// Interfaces declared by an ancestor passed to [`extends`](Self::extends)
    /// are inherited.
    pub fn implements<I>(&mut self) -> &mut Self
    where
        I: ?Sized + 'static,
        E: Upcast<I>,
    {
        self.interfaces.push(ShapeEntry::direct::<I>());
        self
    }

    /// Declare `P` as the immediate ancestor of `E`.
    ///
    /// `P`'s own interfaces and ancestors are inherited: its interfaces join
    /// the interface list, and its ancestor chain follows `P`.
    pub fn extends<P>(&mut self) -> &mut Self
    where
        P: Event,
        E: Upcast<P>,
    {
        let mut parent = ShapeSet::<P>::new();
        P::declare_shapes(&mut parent);

        self.interfaces
            .extend(parent.interfaces.into_iter().map(|entry| entry.lift::<E>()));
        self.ancestors.push(ShapeEntry::direct::<P>());
        self.ancestors
            .extend(parent.ancestors.into_iter().map(|entry| entry.lift::<E>()));
        self
    }
}

/// Ordered set of shapes an event type satisfies. Duplicates are kept; the
/// dispatch resolver visits each registry slot only once.
pub struct TypeClosure<E> {
    entries: Vec<ShapeEntry<E>>,
}

impl<E: Event> TypeClosure<E> {
    pub fn build() -> Self {
        let mut declared = ShapeSet::<E>::new();
        E::declare_shapes(&mut declared);

        let mut entries =
            Vec::with_capacity(1 + declared.interfaces.len() + declared.ancestors.len());
        entries.push(ShapeEntry::direct::<E>());
        entries.extend(declared.interfaces);
        entries.extend(declared.ancestors);
        Self { entries }
    }

    pub fn entries(&self) -> &[ShapeEntry<E>] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = ShapeKey> + '_ {
        self.entries.iter().map(ShapeEntry::key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-type cache of [`TypeClosure`]s.
#[derive(Default)]
pub struct ClosureCache {
    closures: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ClosureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closure of `event`'s concrete type.
    pub fn resolve<E: Event>(&self, _event: &E) -> Arc<TypeClosure<E>> {
        self.get::<E>()
    }

    pub fn get<E: Event>(&self) -> Arc<TypeClosure<E>> {
        let key = TypeId::of::<E>();

        let cached = self
            .closures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(closure) = cached.and_then(|c| c.downcast::<TypeClosure<E>>().ok()) {
            return closure;
        }

        // Built outside the lock: declare_shapes is user code.
        let built = Arc::new(TypeClosure::<E>::build());
        let stored = self
            .closures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>)
            .clone();
        stored.downcast::<TypeClosure<E>>().unwrap_or(built)
    }

    /// Number of concrete event types resolved so far.
    pub fn len(&self) -> usize {
        self.closures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for ClosureCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClosureCache")
            .field("types", &self.len())
            .finish()
    }
}
