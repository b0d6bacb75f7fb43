//! Optimistic acquisition: try everything, back off on contention.

use std::sync::Arc;
use std::thread;

use tracing::trace;

use crate::error::StrategyError;
use crate::resource::Resource;
use crate::strategy::{Acquisition, AcquisitionStrategy, LockSet, StrategyKind};
use crate::types::{ActorId, ResourceId};

/// Never blocks on a resource. Each pass try-locks the set in order; a busy
/// resource rolls the pass back in reverse order and the whole set is
/// retried.
///
/// Deadlock cannot happen because nothing is held while waiting. Livelock
/// and starvation can, in principle.
#[derive(Debug)]
pub struct OptimisticStrategy {
    actor: ActorId,
    locks: LockSet,
    retries: u64,
}

impl OptimisticStrategy {
    /// Create an optimistic strategy over `resources`.
    pub fn new(actor: ActorId, resources: Vec<Arc<Resource>>) -> Self {
        Self {
            actor,
            locks: LockSet::new(resources),
            retries: 0,
        }
    }

    /// Failed passes since creation.
    pub fn retries(&self) -> u64 {
        self.retries
    }
}

impl AcquisitionStrategy for OptimisticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimistic
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.locks.ids()
    }

    fn acquire(&mut self) -> Result<Acquisition, StrategyError> {
        loop {
            match self.locks.try_lock_all() {
                Ok(()) => return Ok(Acquisition::Acquired),
                Err(busy) => {
                    self.retries += 1;
                    trace!(actor = %self.actor, resource = %busy, "optimistic pass rolled back");
                    thread::yield_now();
                }
            }
        }
    }

    fn release(&mut self) -> Result<(), StrategyError> {
        if self.locks.unlock_all() {
            Ok(())
        } else {
            Err(StrategyError::NotHeld { actor: self.actor })
        }
    }
}
