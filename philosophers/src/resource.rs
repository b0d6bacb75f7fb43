//! Shared, mutually-exclusive resources.
//!
//! A [`Resource`] is the lock granularity unit. Strategies hold it through
//! an `Arc` and take its lock with owned guards ([`ResourceGuard`]) so a
//! lock taken in `acquire()` can be kept across calls and dropped in
//! `release()`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RawMutex};

use crate::context::SimContext;
use crate::types::ResourceId;

/// Owned lock guard on a resource. Dropping it unlocks the resource.
pub type ResourceGuard = lock_api::ArcMutexGuard<RawMutex, ()>;

/// A unit of mutually-exclusive access.
#[derive(Debug)]
pub struct Resource {
    id: ResourceId,
    lock: Arc<Mutex<()>>,
}

impl Resource {
    /// Create a resource with the next id from `ctx`.
    pub fn new(ctx: &SimContext) -> Arc<Self> {
        Arc::new(Self {
            id: ctx.next_resource_id(),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// The resource's unique id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Block until the lock is available.
    pub fn lock(&self) -> ResourceGuard {
        self.lock.lock_arc()
    }

    /// Wait at most `timeout` for the lock.
    pub fn lock_for(&self, timeout: Duration) -> Option<ResourceGuard> {
        self.lock.try_lock_arc_for(timeout)
    }

    /// Take the lock only if it is free right now.
    pub fn try_lock(&self) -> Option<ResourceGuard> {
        self.lock.try_lock_arc()
    }

    /// Whether some actor currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}
