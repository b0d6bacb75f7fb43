//! Actors seated at the table and the threads that drive them.
//!
//! An [`Actor`] owns one acquisition strategy and runs a fixed cycle:
//!
//! ```text
//! Idle -> Acquiring -> Eating -> Releasing -> Thinking -> Idle
//! ```
//!
//! Each cycle is profiled into a [`Measurement`]. The [`ActorRunner`] loops
//! cycles on a dedicated OS thread until cancelled, and an [`ActorFactory`]
//! builds a whole table of actors wired for one strategy.

mod factory;
mod probe;
mod profiler;
mod runner;

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::config::ActorConfig;
use crate::error::StrategyError;
use crate::strategy::{Acquisition, AcquisitionStrategy, StrategyKind};
use crate::telemetry::{Measurement, PHASE_COUNT};
use crate::types::{ActorId, ResourceId};

pub use factory::{
    ActorFactory, ArbitratedFactory, HierarchyFactory, NaiveFactory, OptimisticFactory,
    TokenPassingFactory,
};
pub use probe::ExclusionProbe;
pub use profiler::PhaseProfiler;
pub use runner::{ActorRunner, FaultHandler, RunnerExit, StartGate};

/// Where an actor is within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Between cycles.
    Idle,
    /// Inside `acquire()`.
    Acquiring,
    /// Holding every resource.
    Eating,
    /// Inside `release()`.
    Releasing,
    /// Working without resources.
    Thinking,
}

/// Result of one call to [`Actor::run_cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle ran to completion.
    Completed(Measurement),
    /// The strategy gave up on a lock. Nothing is held.
    PossibleDeadlock {
        /// Resource that could not be locked.
        resource: ResourceId,
        /// How long the lock attempt waited.
        waited: Duration,
    },
}

/// A simulated philosopher.
#[derive(Debug)]
pub struct Actor {
    id: ActorId,
    strategy: Box<dyn AcquisitionStrategy>,
    resources: Vec<ResourceId>,
    config: ActorConfig,
    state: ActorState,
    probe: Option<Arc<ExclusionProbe>>,
}

impl Actor {
    /// Create an actor driving `strategy`.
    pub fn new(id: ActorId, strategy: Box<dyn AcquisitionStrategy>, config: ActorConfig) -> Self {
        let resources = strategy.resources();
        Self {
            id,
            strategy,
            resources,
            config,
            state: ActorState::Idle,
            probe: None,
        }
    }

    /// Report occupancy of the eating phase to `probe`.
    pub fn attach_probe(&mut self, probe: Arc<ExclusionProbe>) {
        self.probe = Some(probe);
    }

    /// The actor's id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// The strategy the actor acquires with.
    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Ids of the resources the actor uses.
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Current position in the cycle.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Run one acquire, eat, release, think cycle.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, StrategyError> {
        let mut profiler = PhaseProfiler::<PHASE_COUNT>::start();

        self.state = ActorState::Acquiring;
        if let Acquisition::TimedOut { resource, waited } = self.strategy.acquire()? {
            self.state = ActorState::Idle;
            return Ok(CycleOutcome::PossibleDeadlock { resource, waited });
        }
        profiler.lap();

        self.state = ActorState::Eating;
        if let Some(probe) = &self.probe {
            probe.enter(self.id, &self.resources);
        }
        spin_work(self.config.eat_work);
        if let Some(probe) = &self.probe {
            probe.exit(&self.resources);
        }
        profiler.lap();

        self.state = ActorState::Releasing;
        self.strategy.release()?;
        profiler.lap();

        self.state = ActorState::Thinking;
        spin_work(self.config.think_work);
        profiler.lap();

        self.state = ActorState::Idle;
        let (phases, total) = profiler.finish();
        trace!(actor = %self.id, ?total, "cycle completed");
        Ok(CycleOutcome::Completed(Measurement {
            actor_id: self.id,
            phases,
            total,
        }))
    }
}

/// Burn `units` iterations of CPU without touching shared state.
fn spin_work(units: u32) {
    let mut acc = 0u64;
    for i in 0..units {
        acc = black_box(acc.wrapping_add(u64::from(i)));
    }
    black_box(acc);
}
