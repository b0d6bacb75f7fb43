//! Table snapshots and where they are stored.

mod memory;
mod traits;

use std::time::SystemTime;

use serde::Serialize;

use crate::aggregator::TotalStats;
use crate::strategy::StrategyKind;
use crate::types::{ActorId, TableId};

pub use memory::{InMemoryStateRepository, StateRecord};
pub use traits::StateSink;

/// Full snapshot of a table, sent to the [`StateSink`].
#[derive(Debug, Clone, Serialize)]
pub struct StateUpdate {
    /// The table being reported.
    pub table_id: TableId,
    /// Strategy every actor at the table uses.
    pub strategy: StrategyKind,
    /// When the run started.
    pub start_time: SystemTime,
    /// When the run ended, set only on the final snapshot.
    pub end_time: Option<SystemTime>,
    /// Whether the watchdog has declared a deadlock.
    pub deadlock_detected: bool,
    /// Totals of every actor seen so far, ordered by actor id.
    pub totals: Vec<(ActorId, TotalStats)>,
}

impl StateUpdate {
    /// Whether this is the final snapshot of the run.
    pub fn is_final(&self) -> bool {
        self.end_time.is_some()
    }
}
