//! Outcome of one table run.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::actor::RunnerExit;
use crate::aggregator::TotalStats;
use crate::strategy::StrategyKind;
use crate::types::{ActorId, TableId};

/// How one actor's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorExit {
    /// Stopped by cancellation.
    Cancelled,
    /// Gave up on a lock and stopped.
    PossibleDeadlock,
    /// Faulted; the fault itself is carried by the returned error.
    Faulted,
}

impl From<RunnerExit> for ActorExit {
    fn from(exit: RunnerExit) -> Self {
        match exit {
            RunnerExit::Cancelled { .. } => ActorExit::Cancelled,
            RunnerExit::PossibleDeadlock { .. } => ActorExit::PossibleDeadlock,
            RunnerExit::Faulted { .. } => ActorExit::Faulted,
        }
    }
}

/// Final report of a table run.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    /// The table.
    pub table_id: TableId,
    /// Strategy every actor used.
    pub strategy: StrategyKind,
    /// Whether the watchdog declared a deadlock.
    pub deadlock_detected: bool,
    /// Per-actor totals, ordered by actor id.
    pub totals: Vec<(ActorId, TotalStats)>,
    /// How each actor's loop ended, ordered by actor id.
    pub exits: Vec<(ActorId, ActorExit)>,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Mutual exclusion violations seen by the exclusion probe, when one
    /// was attached.
    pub exclusion_violations: Option<u64>,
}

impl TableReport {
    /// Totals summed over every actor.
    pub fn grand_total(&self) -> TotalStats {
        TotalStats::merge(self.totals.iter().map(|(_, stats)| stats))
    }

    /// Completed cycles over every actor.
    pub fn total_cycles(&self) -> u64 {
        self.totals.iter().map(|(_, stats)| stats.cycles).sum()
    }

    /// Number of actors that stopped on a lock timeout.
    pub fn possible_deadlocks(&self) -> usize {
        self.exits
            .iter()
            .filter(|(_, exit)| *exit == ActorExit::PossibleDeadlock)
            .count()
    }
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deadlock_detected {
            writeln!(f, "!!! DEADLOCK DETECTED !!!")?;
        }
        writeln!(f, "=== {} ({}) ===", self.table_id, self.strategy)?;
        writeln!(
            f,
            "Actors: {}  Elapsed: {:.2}s",
            self.exits.len(),
            self.elapsed.as_secs_f64()
        )?;
        if let Some(violations) = self.exclusion_violations {
            writeln!(f, "Exclusion violations: {violations}")?;
        }
        let timeouts = self.possible_deadlocks();
        if timeouts > 0 {
            writeln!(f, "Actors stopped on lock timeout: {timeouts}")?;
        }
        writeln!(f)?;

        for (actor_id, stats) in &self.totals {
            writeln!(f, "{:<12}{}", actor_id.to_string(), stats)?;
        }
        write!(f, "{:<12}{}", "TOTAL", self.grand_total())
    }
}
