//! Arbitrated acquisition: one actor at a time picks up its resources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::StrategyError;
use crate::resource::Resource;
use crate::strategy::{Acquisition, AcquisitionStrategy, LockSet, StrategyKind};
use crate::types::{ActorId, ResourceId};

/// Table-wide lock serializing the acquisition phase.
///
/// Only acquisition is serialized. Releasing never goes through the
/// arbitrator, so an actor that holds its resources can always give them
/// back.
#[derive(Debug, Default)]
pub struct Arbitrator {
    turn: Mutex<()>,
    grants: AtomicU64,
}

impl Arbitrator {
    /// Create an arbitrator for one table.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of acquisitions completed under this arbitrator.
    pub fn grants(&self) -> u64 {
        self.grants.load(Ordering::Relaxed)
    }

    fn serve<R>(&self, f: impl FnOnce() -> R) -> R {
        let _turn = self.turn.lock();
        let result = f();
        self.grants.fetch_add(1, Ordering::Relaxed);
        result
    }
}

/// Locks resources in wired order while holding the table's [`Arbitrator`].
#[derive(Debug)]
pub struct ArbitratedStrategy {
    actor: ActorId,
    locks: LockSet,
    arbitrator: Arc<Arbitrator>,
    reach_delay: Duration,
}

impl ArbitratedStrategy {
    /// Create an arbitrated strategy sharing `arbitrator` with the rest of
    /// the table.
    pub fn new(
        actor: ActorId,
        resources: Vec<Arc<Resource>>,
        arbitrator: Arc<Arbitrator>,
        reach_delay: Duration,
    ) -> Self {
        Self {
            actor,
            locks: LockSet::new(resources),
            arbitrator,
            reach_delay,
        }
    }
}

impl AcquisitionStrategy for ArbitratedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Arbitrated
    }

    fn resources(&self) -> Vec<ResourceId> {
        self.locks.ids()
    }

    fn acquire(&mut self) -> Result<Acquisition, StrategyError> {
        let locks = &mut self.locks;
        let reach_delay = self.reach_delay;
        self.arbitrator.serve(|| locks.lock_all(reach_delay));
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
