//! Per-actor accumulated timing.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::telemetry::{Measurement, Phase, PHASE_COUNT};
use crate::types::ActorId;

/// Sum of every measurement reported by one actor.
///
/// A merged table-wide total has no actor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TotalStats {
    /// The actor these totals belong to, `None` for a merged total.
    pub actor_id: Option<ActorId>,
    /// Sum of each phase, indexed by [`Phase::index`].
    pub phases: [Duration; PHASE_COUNT],
    /// Sum of cycle wall times.
    pub total: Duration,
    /// Completed cycles.
    pub cycles: u64,
}

impl TotalStats {
    /// Empty totals for `actor_id`.
    pub fn new(actor_id: ActorId) -> Self {
        Self {
            actor_id: Some(actor_id),
            ..Self::default()
        }
    }

    /// Add one measurement.
    pub fn record(&mut self, measurement: &Measurement) {
        for (sum, phase) in self.phases.iter_mut().zip(measurement.phases) {
            *sum += phase;
        }
        self.total += measurement.total;
        self.cycles += 1;
    }

    /// Sum several actors' totals into one table-wide total.
    pub fn merge<'a>(stats: impl IntoIterator<Item = &'a TotalStats>) -> TotalStats {
        stats.into_iter().fold(TotalStats::default(), |mut acc, s| {
            for (sum, phase) in acc.phases.iter_mut().zip(s.phases) {
                *sum += phase;
            }
            acc.total += s.total;
            acc.cycles += s.cycles;
            acc
        })
    }

    /// Summed time of one phase.
    pub fn phase(&self, phase: Phase) -> Duration {
        self.phases[phase.index()]
    }

    /// Share of the total time spent in `phase`, in percent.
    pub fn share(&self, phase: Phase) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        self.phase(phase).as_secs_f64() * 100.0 / self.total.as_secs_f64()
    }
}

impl fmt::Display for TotalStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>9} cycles", self.cycles)?;
        for phase in Phase::ALL {
            write!(f, "  {} {:5.1}%", phase.label(), self.share(phase))?;
        }
        Ok(())
    }
}
