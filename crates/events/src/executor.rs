//! Concurrent executor boundary for fan-out delivery.
//!
//! The bus hands each handler invocation to an [`Executor`] as a [`WorkUnit`]
//! and gets back a [`UnitHandle`] that resolves once the unit has finished.
//! Awaiting every handle is the bus's job; the executor only runs units.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use shapebus_core::EventId;

use crate::failure::HandlerFailure;
use crate::shape::ShapeKey;

/// How a work unit ended when it did not fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The handler ran.
    Invoked,
    /// The event was already disposed; the handler was not run.
    Skipped,
}

pub type UnitResult = Result<UnitOutcome, HandlerFailure>;

/// Completion handle for a submitted unit.
pub type UnitHandle = Pin<Box<dyn Future<Output = UnitResult> + Send + 'static>>;

/// One handler invocation for one event.
pub struct WorkUnit {
    shape: ShapeKey,
    event_id: EventId,
    run: Box<dyn FnOnce() -> UnitResult + Send + 'static>,
}

impl WorkUnit {
    pub fn new<F>(shape: ShapeKey, event_id: EventId, run: F) -> Self
    where
        F: FnOnce() -> UnitResult + Send + 'static,
    {
        Self {
            shape,
            event_id,
            run: Box::new(run),
        }
    }

    pub fn shape(&self) -> ShapeKey {
        self.shape
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn run(self) -> UnitResult {
        (self.run)()
    }

    /// Failure for a unit that never got to report its own result.
    pub fn aborted(&self, reason: impl Into<String>) -> HandlerFailure {
        HandlerFailure::aborted(self.shape, self.event_id, reason)
    }
}

impl core::fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkUnit")
            .field("shape", &self.shape.name())
            .field("event_id", &self.event_id)
            .finish()
    }
}

/// Runs work units, possibly concurrently.
pub trait Executor: Send + Sync {
    fn submit(&self, unit: WorkUnit) -> UnitHandle;
}

impl<X> Executor for Arc<X>
where
    X: Executor + ?Sized,
{
    fn submit(&self, unit: WorkUnit) -> UnitHandle {
        (**self).submit(unit)
    }
}

/// Runs each unit on tokio's blocking pool.
///
/// Uses the runtime handle given at construction, or the ambient runtime at
/// submission time. With a concurrency limit, at most that many units run at
/// once; the rest wait for a permit.
#[derive(Debug, Clone, Default)]
pub struct TokioExecutor {
    runtime: Option<Handle>,
    limit: Option<Arc<Semaphore>>,
}

impl TokioExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// # Panics
    ///
    /// If `max` exceeds [`Semaphore::MAX_PERMITS`]. [`BusConfig::validate`]
    /// rejects such limits before the bus builder gets here.
    ///
    /// [`BusConfig::validate`]: crate::config::BusConfig::validate
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(max)));
        self
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, unit: WorkUnit) -> UnitHandle {
        let runtime = match self.runtime.clone() {
            Some(runtime) => runtime,
            None => match Handle::try_current() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let failure = unit.aborted(err.to_string());
                    return Box::pin(std::future::ready(Err(failure)));
                }
            },
        };

        let shape = unit.shape();
        let event_id = unit.event_id();
        let limit = self.limit.clone();

        let task = runtime.spawn(async move {
            let _permit = match limit {
                Some(semaphore) => Some(
                    semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| e.to_string())?,
                ),
                None => None,
            };
            tokio::task::spawn_blocking(move || unit.run())
                .await
                .map_err(|e| e.to_string())
        });

        Box::pin(async move {
            match task.await {
                Ok(Ok(result)) => result,
                Ok(Err(reason)) => Err(HandlerFailure::aborted(shape, event_id, reason)),
                Err(join) => Err(HandlerFailure::aborted(shape, event_id, join.to_string())),
            }
        })
    }
}

/// Runs each unit immediately on the submitting thread.
///
/// Deterministic; useful in tests and single-threaded hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn submit(&self, unit: WorkUnit) -> UnitHandle {
        Box::pin(std::future::ready(unit.run()))
    }
}
