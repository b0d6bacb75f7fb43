//! Per-cycle timing telemetry.
//!
//! Actor threads produce one [`Measurement`] per completed cycle and hand it
//! to a [`MeasurementSink`]. The table's sink is a [`TelemetrySink`], which
//! stamps the shared [`ReportClock`] and pushes into a lock-free
//! [`TelemetryBuffer`]; the aggregator drains full batches from the other
//! end.

mod buffer;
mod sink;

use std::time::Duration;

use serde::Serialize;

use crate::types::ActorId;

pub use buffer::{BatchPoll, BatchReceiver, TelemetryBuffer};
pub use sink::{ReportClock, TelemetrySink};

/// Number of profiled phases in one cycle.
pub const PHASE_COUNT: usize = 4;

/// One profiled phase of an actor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Obtaining the resources.
    Acquire,
    /// Working with the resources held.
    Eat,
    /// Giving the resources back.
    Release,
    /// Working without resources.
    Think,
}

impl Phase {
    /// All phases in cycle order.
    pub const ALL: [Phase; PHASE_COUNT] = [Phase::Acquire, Phase::Eat, Phase::Release, Phase::Think];

    /// Position of the phase within a cycle.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short lowercase label.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Acquire => "acquire",
            Phase::Eat => "eat",
            Phase::Release => "release",
            Phase::Think => "think",
        }
    }
}

/// Timing of one completed actor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Measurement {
    /// Actor that ran the cycle.
    pub actor_id: ActorId,
    /// Duration of each phase, indexed by [`Phase::index`].
    pub phases: [Duration; PHASE_COUNT],
    /// Wall time of the whole cycle.
    pub total: Duration,
}

impl Measurement {
    /// Duration of one phase.
    pub fn phase(&self, phase: Phase) -> Duration {
        self.phases[phase.index()]
    }
}

/// Receives measurements from actor threads.
///
/// `report` is called on the actor's own thread once per cycle and must not
/// block.
pub trait MeasurementSink: Send + Sync {
    /// Record one measurement.
    fn report(&self, measurement: Measurement);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_indices_follow_cycle_order() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
    }

    #[test]
    fn test_measurement_phase_lookup() {
        let m = Measurement {
            actor_id: ActorId(1),
            phases: [
                Duration::from_micros(1),
                Duration::from_micros(2),
                Duration::from_micros(3),
                Duration::from_micros(4),
            ],
            total: Duration::from_micros(10),
        };
        assert_eq!(m.phase(Phase::Release), Duration::from_micros(3));
        assert_eq!(m.phase(Phase::Think), Duration::from_micros(4));
    }
}
