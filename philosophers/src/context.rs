//! Process-wide simulation context.
//!
//! `SimContext` owns the id counters for actors and resources. One context
//! is created at startup and passed to every factory, instead of keeping the
//! counters in global statics. Tests create their own context to get
//! predictable ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{ActorId, ResourceId};

/// Shared id allocator for actors and resources.
#[derive(Debug, Default)]
pub struct SimContext {
    next_actor: AtomicU64,
    next_resource: AtomicU64,
}

impl SimContext {
    /// Create a new context with both counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new context already wrapped in an `Arc` for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Allocate the next actor id.
    pub fn next_actor_id(&self) -> ActorId {
        ActorId(self.next_actor.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate the next resource id.
    pub fn next_resource_id(&self) -> ResourceId {
        ResourceId(self.next_resource.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of actor ids handed out so far.
    pub fn actors_created(&self) -> u64 {
        self.next_actor.load(Ordering::Relaxed)
    }

    /// Number of resource ids handed out so far.
    pub fn resources_created(&self) -> u64 {
        self.next_resource.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_ids_are_monotonic() {
        let ctx = SimContext::new();
        assert_eq!(ctx.next_resource_id(), ResourceId(0));
        assert_eq!(ctx.next_resource_id(), ResourceId(1));
        assert_eq!(ctx.next_actor_id(), ActorId(0));
        assert_eq!(ctx.resources_created(), 2);
        assert_eq!(ctx.actors_created(), 1);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ctx = SimContext::shared();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || (0..1000).map(|_| ctx.next_resource_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread panicked") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
