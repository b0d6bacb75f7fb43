//! Occupancy probe used to check mutual exclusion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::error;

use crate::types::{ActorId, ResourceId};

/// Per-resource occupancy counters, bumped around the eating phase.
///
/// The set of resources is fixed at construction. Entering an unknown
/// resource is ignored.
#[derive(Debug, Default)]
pub struct ExclusionProbe {
    occupancy: HashMap<ResourceId, AtomicU32>,
    max_occupancy: AtomicU32,
    violations: AtomicU64,
}

impl ExclusionProbe {
    /// Create a probe watching `resources`.
    pub fn new(resources: impl IntoIterator<Item = ResourceId>) -> Arc<Self> {
        Arc::new(Self {
            occupancy: resources
                .into_iter()
                .map(|id| (id, AtomicU32::new(0)))
                .collect(),
            ..Self::default()
        })
    }

    /// Mark `resources` as in use by `actor`.
    pub fn enter(&self, actor: ActorId, resources: &[ResourceId]) {
        for id in resources {
            if let Some(counter) = self.occupancy.get(id) {
                let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_occupancy.fetch_max(now, Ordering::Relaxed);
                if now > 1 {
                    self.violations.fetch_add(1, Ordering::Relaxed);
                    error!(actor = %actor, resource = %id, occupancy = now, "mutual exclusion violated");
                }
            }
        }
    }

    /// Mark `resources` as no longer in use.
    pub fn exit(&self, resources: &[ResourceId]) {
        for id in resources {
            if let Some(counter) = self.occupancy.get(id) {
                counter.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Times a resource was entered while already occupied.
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    /// Highest simultaneous occupancy seen on any resource.
    pub fn max_occupancy(&self) -> u32 {
        self.max_occupancy.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlap_is_counted() {
        let probe = ExclusionProbe::new([ResourceId(1), ResourceId(2)]);
        probe.enter(ActorId(0), &[ResourceId(1), ResourceId(2)]);
        assert_eq!(probe.violations(), 0);

        probe.enter(ActorId(1), &[ResourceId(2)]);
        assert_eq!(probe.violations(), 1);
        assert_eq!(probe.max_occupancy(), 2);

        probe.exit(&[ResourceId(2)]);
        probe.exit(&[ResourceId(1), ResourceId(2)]);
        probe.enter(ActorId(1), &[ResourceId(2)]);
        assert_eq!(probe.violations(), 1);
    }

    #[test]
    fn test_unknown_resources_are_ignored() {
        let probe = ExclusionProbe::new([ResourceId(1)]);
        probe.enter(ActorId(0), &[ResourceId(9)]);
        probe.enter(ActorId(1), &[ResourceId(9)]);
        assert_eq!(probe.violations(), 0);
        assert_eq!(probe.max_occupancy(), 0);
    }
}
