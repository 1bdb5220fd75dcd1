//! # Per-Resource Dispatch
//!
//! The catalog has no transactions, so two runs for the same resource
//! could race a delete against a create. Every entry point goes through a
//! [`Dispatcher`], which holds a keyed async mutex per resource for the
//! whole run. Runs for different resources proceed in parallel.
//!
//! Background runs started with [`Dispatcher::spawn`] are counted so a
//! shutting-down service can [`drain`](Dispatcher::drain) them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};
use tokio::task::JoinHandle;

use geosync_core::ResourceId;

use crate::error::ReconcileError;
use crate::outcome::Outcome;
use crate::reconcile::Reconciler;

/// Keyed async mutexes, one per resource id.
#[derive(Debug, Default)]
pub struct ResourceLocks {
    inner: DashMap<ResourceId, Arc<Mutex<()>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of a resource.
    pub async fn acquire(&self, resource_id: &ResourceId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held across the await.
        let lock = self
            .inner
            .entry(resource_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Whether a resource is currently owned by a run.
    pub fn is_held(&self, resource_id: &ResourceId) -> bool {
        self.inner
            .get(resource_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune(&self) {
        self.inner.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Count of spawned runs that have not finished.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when a spawned run ends, even by panic.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(in_flight.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Serializes reconciliation runs per resource.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    reconciler: Arc<Reconciler>,
    locks: Arc<ResourceLocks>,
    in_flight: Arc<InFlight>,
}

impl Dispatcher {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            locks: Arc::new(ResourceLocks::new()),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn locks(&self) -> &ResourceLocks {
        &self.locks
    }

    /// Run a reconciliation once no other run holds the resource.
    pub async fn dispatch(&self, resource_id: &ResourceId) -> Outcome {
        let guard = self.locks.acquire(resource_id).await;
        let outcome = self.reconciler.reconcile(resource_id).await;
        drop(guard);
        self.locks.prune();
        outcome
    }

    /// Run [`dispatch`](Self::dispatch) on a background task.
    pub fn spawn(&self, resource_id: ResourceId) -> JoinHandle<Outcome> {
        let dispatcher = self.clone();
        let guard = InFlightGuard::enter(&self.in_flight);
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&resource_id).await;
            drop(guard);
            outcome
        })
    }

    /// Number of spawned runs still going.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every spawned run has finished.
    pub async fn drain(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Tear a resource down, serialized with its reconciliations.
    pub async fn teardown(&self, resource_id: &ResourceId) -> Result<(), ReconcileError> {
        let guard = self.locks.acquire(resource_id).await;
        let result = self.reconciler.teardown(resource_id).await;
        drop(guard);
        self.locks.prune();
        result
    }
}
