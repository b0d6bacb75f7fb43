//! Drives one actor on a dedicated OS thread.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::actor::{Actor, CycleOutcome};
use crate::error::ActorFault;
use crate::telemetry::MeasurementSink;
use crate::types::{ActorId, ResourceId};

/// Callback receiving faults raised on actor threads.
pub type FaultHandler = Arc<dyn Fn(ActorFault) + Send + Sync>;

/// One-shot gate holding every runner until the table is fully set up.
#[derive(Debug, Default)]
pub struct StartGate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl StartGate {
    /// Create a closed gate.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Let every waiting and future runner through.
    pub fn open(&self) {
        *self.open.lock() = true;
        self.opened.notify_all();
    }

    /// Block until the gate is opened.
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.opened.wait(&mut open);
        }
    }
}

/// Why a runner's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerExit {
    /// The table's cancellation token fired.
    Cancelled {
        /// Cycles completed.
        cycles: u64,
    },
    /// A bounded lock attempt expired.
    PossibleDeadlock {
        /// Cycles completed.
        cycles: u64,
        /// Resource that could not be locked.
        resource: ResourceId,
    },
    /// The strategy failed and the fault handler was called.
    Faulted {
        /// Cycles completed.
        cycles: u64,
    },
}

impl RunnerExit {
    /// Cycles completed before the loop ended.
    pub fn cycles(&self) -> u64 {
        match self {
            RunnerExit::Cancelled { cycles }
            | RunnerExit::PossibleDeadlock { cycles, .. }
            | RunnerExit::Faulted { cycles } => *cycles,
        }
    }
}

/// Loops an actor's cycles, reporting each measurement, until cancelled.
pub struct ActorRunner {
    actor: Actor,
    sink: Arc<dyn MeasurementSink>,
    cancellation: CancellationToken,
    on_fault: FaultHandler,
    gate: Option<Arc<StartGate>>,
}

impl ActorRunner {
    /// Create a runner for `actor`.
    pub fn new(
        actor: Actor,
        sink: Arc<dyn MeasurementSink>,
        cancellation: CancellationToken,
        on_fault: FaultHandler,
    ) -> Self {
        Self {
            actor,
            sink,
            cancellation,
            on_fault,
            gate: None,
        }
    }

    /// Hold the first cycle until `gate` opens.
    pub fn with_start_gate(mut self, gate: Arc<StartGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Id of the driven actor.
    pub fn actor_id(&self) -> ActorId {
        self.actor.id()
    }

    /// Run on a new thread named after the actor.
    pub fn spawn(self) -> io::Result<JoinHandle<RunnerExit>> {
        thread::Builder::new()
            .name(self.actor.id().to_string())
            .spawn(move || self.run())
    }

    /// Run on the current thread.
    pub fn run(mut self) -> RunnerExit {
        if let Some(gate) = self.gate.take() {
            gate.wait();
        }

        let id = self.actor.id();
        debug!(actor = %id, strategy = %self.actor.kind(), "actor started");

        let mut cycles = 0u64;
        while !self.cancellation.is_cancelled() {
            match self.actor.run_cycle() {
                Ok(CycleOutcome::Completed(measurement)) => {
                    cycles += 1;
                    self.sink.report(measurement);
                }
                Ok(CycleOutcome::PossibleDeadlock { resource, waited }) => {
                    warn!(actor = %id, %resource, ?waited, cycles, "possible deadlock, actor stopping");
                    return RunnerExit::PossibleDeadlock { cycles, resource };
                }
                Err(source) => {
                    error!(actor = %id, error = %source, cycles, "actor faulted");
                    (self.on_fault)(ActorFault::Strategy { actor: id, source });
                    return RunnerExit::Faulted { cycles };
                }
            }
        }

        debug!(actor = %id, cycles, "actor cancelled");
        RunnerExit::Cancelled { cycles }
    }
}
