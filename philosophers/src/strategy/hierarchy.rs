//! Resource hierarchy acquisition.

use std::sync::Arc;
use std::time::Duration;

use crate::error::StrategyError;
use crate::resource::Resource;
use crate::strategy::{Acquisition, AcquisitionStrategy, LockSet, StrategyKind};
use crate::types::{ActorId, ResourceId};

/// Locks resources in ascending id order, blocking without limit.
///
/// Every actor climbs the same global order, so no cycle of waiters can
/// form.
#[derive(Debug)]
pub struct HierarchyStrategy {
    actor: ActorId,
    locks: LockSet,
    reach_delay: Duration,
}

impl HierarchyStrategy {
    /// Create a hierarchy strategy. The resources are sorted by id once,
    /// here.
    pub fn new(actor: ActorId, resources: Vec<Arc<Resource>>, reach_delay: Duration) -> Self {
        Self {
            actor,
            locks: LockSet::new(resources).sorted_by_id(),
            reach_delay,
        }
    }
}

impl AcquisitionStrategy for HierarchyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hierarchy
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.locks.ids()
    }

    fn acquire(&mut self) -> Result<Acquisition, StrategyError> {
        self.locks.lock_all(self.reach_delay);
        Ok(Acquisition::Acquired)
    }

    fn release(&mut self) -> Result<(), StrategyError> {
        if self.locks.unlock_all() {
            Ok(())
        } else {
            Err(StrategyError::NotHeld { actor: self.actor })
        }
    }
}
