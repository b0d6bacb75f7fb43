//! Fixed-order blocking acquisition with a timeout escape.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::error::StrategyError;
use crate::resource::Resource;
use crate::strategy::{Acquisition, AcquisitionStrategy, LockSet, StrategyKind};
use crate::types::{ActorId, ResourceId};

/// Locks resources in the order they were wired, with no cycle avoidance.
///
/// When every actor holds its first resource and waits for its second, the
/// table is in a circular wait. Each lock attempt is bounded by
/// `lock_timeout`; on expiry the strategy releases what it took and reports
/// [`Acquisition::TimedOut`].
#[derive(Debug)]
pub struct NaiveStrategy {
    actor: ActorId,
    locks: LockSet,
    lock_timeout: Duration,
    reach_delay: Duration,
}

impl NaiveStrategy {
    /// Create a naive strategy over `resources`, locked in the given order.
    pub fn new(
        actor: ActorId,
        resources: Vec<Arc<Resource>>,
        lock_timeout: Duration,
        reach_delay: Duration,
    ) -> Self {
        Self {
            actor,
            locks: LockSet::new(resources),
            lock_timeout,
            reach_delay,
        }
    }
}

impl AcquisitionStrategy for NaiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Naive
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.locks.ids()
    }

    fn acquire(&mut self) -> Result<Acquisition, StrategyError> {
        let outcome = self.locks.lock_all_within(self.lock_timeout, self.reach_delay);
        if let Acquisition::TimedOut { resource, waited } = outcome {
            trace!(actor = %self.actor, %resource, ?waited, "naive lock attempt expired");
        }
        Ok(outcome)
    }

    fn release(&mut self) -> Result<(), StrategyError> {
        if self.locks.unlock_all() {
            Ok(())
        } else {
            Err(StrategyError::NotHeld { actor: self.actor })
        }
    }
}
