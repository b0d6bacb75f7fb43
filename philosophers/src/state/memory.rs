//! In-memory state repository.

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::aggregator::TotalStats;
use crate::error::SinkError;
use crate::state::{StateSink, StateUpdate};
use crate::strategy::StrategyKind;
use crate::types::{ActorId, TableId};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Latest known state of one actor at one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRecord {
    /// The table.
    pub table_id: TableId,
    /// The actor.
    pub actor_id: ActorId,
    /// Strategy the table runs.
    pub strategy: StrategyKind,
    /// When the run started.
    pub start_time: SystemTime,
    /// When the run ended, if it has.
    pub end_time: Option<SystemTime>,
    /// Whether the watchdog declared a deadlock at this table.
    pub deadlock_detected: bool,
    /// The actor's totals.
    pub stats: TotalStats,
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<(TableId, ActorId), StateRecord>,
    last_progress: Option<Instant>,
}

/// Keeps the latest record per (table, actor) in memory.
///
/// Suitable for tests and single-process runs.
#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    inner: Mutex<Inner>,
}

impl InMemoryStateRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record, ordered by table then actor.
    pub fn get_all(&self) -> Vec<StateRecord> {
        self.inner.lock().records.values().cloned().collect()
    }

    /// Records of one table, ordered by actor.
    pub fn get(&self, table_id: TableId) -> Vec<StateRecord> {
        self.inner
            .lock()
            .records
            .range((table_id, ActorId(0))..=(table_id, ActorId(u64::MAX)))
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateSink for InMemoryStateRepository {
    async fn update_state(&self, update: StateUpdate) -> Result<(), SinkError> {
        let mut inner = self.inner.lock();

        let due = inner
            .last_progress
            .map_or(true, |at| at.elapsed() >= PROGRESS_INTERVAL);
        if due && !update.is_final() {
            let seconds = SystemTime::now()
                .duration_since(update.start_time)
                .unwrap_or_default()
                .as_secs();
            info!(table = %update.table_id, strategy = %update.strategy, "simulating {seconds} seconds...");
            inner.last_progress = Some(Instant::now());
        }

        for (actor_id, stats) in update.totals {
            inner.records.insert(
                (update.table_id, actor_id),
                StateRecord {
                    table_id: update.table_id,
                    actor_id,
                    strategy: update.strategy,
                    start_time: update.start_time,
                    end_time: update.end_time,
                    deadlock_detected: update.deadlock_detected,
                    stats,
                },
            );
        }
        Ok(())
    }
}
