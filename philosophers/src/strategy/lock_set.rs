//! Ordered set of plain resources plus the guards currently held on them.
//!
//! Shared by the four lock-based strategies. The guards vector is either
//! empty or holds one guard per resource, in acquisition order.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::resource::{Resource, ResourceGuard};
use crate::strategy::Acquisition;
use crate::types::ResourceId;

pub(crate) struct LockSet {
    resources: Vec<Arc<Resource>>,
    held: Vec<ResourceGuard>,
}

impl LockSet {
    pub(crate) fn new(resources: Vec<Arc<Resource>>) -> Self {
        let held = Vec::with_capacity(resources.len());
        Self { resources, held }
    }

    /// Reorder the set by ascending resource id. Only valid while nothing
    /// is held.
    pub(crate) fn sorted_by_id(mut self) -> Self {
        debug_assert!(!self.is_held());
        self.resources.sort_by_key(|r| r.id());
        self
    }

    pub(crate) fn ids(&self) -> Vec<ResourceId> {
        self.resources.iter().map(|r| r.id()).collect()
    }

    pub(crate) fn is_held(&self) -> bool {
        !self.held.is_empty()
    }

    /// Lock every resource in order, blocking as long as needed.
    pub(crate) fn lock_all(&mut self, reach_delay: Duration) {
        let last = self.resources.len().saturating_sub(1);
        for (i, resource) in self.resources.iter().enumerate() {
            self.held.push(resource.lock());
            if i < last {
                reach(reach_delay);
            }
        }
    }

    /// Lock every resource in order, waiting at most `timeout` for each.
    /// On expiry everything taken so far is released.
    pub(crate) fn lock_all_within(&mut self, timeout: Duration, reach_delay: Duration) -> Acquisition {
        let last = self.resources.len().saturating_sub(1);
        for (i, resource) in self.resources.iter().enumerate() {
            let started = Instant::now();
            match resource.lock_for(timeout) {
                Some(guard) => self.held.push(guard),
                None => {
                    self.held.clear();
                    return Acquisition::TimedOut {
                        resource: resource.id(),
                        waited: started.elapsed(),
                    };
                }
            }
            if i < last {
                reach(reach_delay);
            }
        }
        Acquisition::Acquired
    }

    /// One non-blocking pass over the set. On the first busy resource,
    /// everything taken in this pass is released in reverse order and the
    /// busy resource's id is returned.
    pub(crate) fn try_lock_all(&mut self) -> Result<(), ResourceId> {
        for resource in &self.resources {
            match resource.try_lock() {
                Some(guard) => self.held.push(guard),
                None => {
                    let busy = resource.id();
                    rollback(&mut self.held);
                    return Err(busy);
                }
            }
        }
        Ok(())
    }

    /// Unlock everything held. Returns false if nothing was held.
    pub(crate) fn unlock_all(&mut self) -> bool {
        if self.held.is_empty() {
            return false;
        }
        self.held.clear();
        true
    }
}

/// Release guards newest first.
fn rollback(held: &mut Vec<ResourceGuard>) {
    while let Some(guard) = held.pop() {
        drop(guard);
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSet")
            .field("resources", &self.ids())
            .field("held", &self.held.len())
            .finish()
    }
}

fn reach(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;

    fn resources(ctx: &SimContext, n: usize) -> Vec<Arc<Resource>> {
        (0..n).map(|_| Resource::new(ctx)).collect()
    }

    #[test]
    fn test_lock_and_unlock_all() {
        let ctx = SimContext::new();
        let rs = resources(&ctx, 3);
        let mut set = LockSet::new(rs.clone());

        set.lock_all(Duration::ZERO);
        assert!(set.is_held());
        assert!(rs.iter().all(|r| r.is_locked()));

        assert!(set.unlock_all());
        assert!(rs.iter().all(|r| !r.is_locked()));
        assert!(!set.unlock_all());
    }

    #[test]
    fn test_try_lock_all_rolls_back() {
        let ctx = SimContext::new();
        let rs = resources(&ctx, 3);
        let _blocker = rs[2].lock();
        let mut set = LockSet::new(rs.clone());

        assert_eq!(set.try_lock_all(), Err(rs[2].id()));
        assert!(!set.is_held());
        assert!(!rs[0].is_locked());
        assert!(!rs[1].is_locked());
    }

    #[test]
    fn test_try_lock_all_succeeds_after_a_failed_pass() {
        let ctx = SimContext::new();
        let rs = resources(&ctx, 3);
        let mut set = LockSet::new(rs.clone());

        let blocker = rs[1].lock();
        assert_eq!(set.try_lock_all(), Err(rs[1].id()));
        assert!(!rs[0].is_locked());
        drop(blocker);

        assert_eq!(set.try_lock_all(), Ok(()));
        assert!(rs.iter().all(|r| r.is_locked()));
        assert!(set.unlock_all());
        assert!(rs.iter().all(|r| !r.is_locked()));
    }

    #[test]
    fn test_lock_all_within_times_out_and_releases() {
        let ctx = SimContext::new();
        let rs = resources(&ctx, 2);
        let _blocker = rs[1].lock();
        let mut set = LockSet::new(rs.clone());

        match set.lock_all_within(Duration::from_millis(10), Duration::ZERO) {
            Acquisition::TimedOut { resource, waited } => {
                assert_eq!(resource, rs[1].id());
                assert!(waited >= Duration::from_millis(10));
            }
            Acquisition::Acquired => panic!("should have timed out"),
        }
        assert!(!set.is_held());
        assert!(!rs[0].is_locked());
    }

    #[test]
    fn test_sorted_by_id() {
        let ctx = SimContext::new();
        let mut rs = resources(&ctx, 3);
        rs.reverse();
        let set = LockSet::new(rs).sorted_by_id();
        let ids = set.ids();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
