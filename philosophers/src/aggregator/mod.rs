//! Telemetry aggregation and the deadlock watchdog.
//!
//! The [`Aggregator`] is the single consumer of a table's telemetry buffer.
//! It folds batches into per-actor [`TotalStats`], sends a snapshot to the
//! state sink every snapshot interval, and a final one after the buffer has
//! been drained. The [`Watchdog`] runs beside it as a separate task.

mod stats;
mod watchdog;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::TableConfig;
use crate::error::TableError;
use crate::state::{StateSink, StateUpdate};
use crate::strategy::StrategyKind;
use crate::telemetry::{BatchPoll, BatchReceiver, Measurement, ReportClock, TelemetryBuffer};
use crate::types::{ActorId, TableId};

pub use stats::TotalStats;
pub use watchdog::Watchdog;

/// What the aggregator knew when its loop ended.
#[derive(Debug, Clone)]
pub struct AggregateSummary {
    /// Per-actor totals, ordered by actor id.
    pub totals: Vec<(ActorId, TotalStats)>,
    /// Whether the watchdog declared a deadlock.
    pub deadlock_detected: bool,
    /// When the run started.
    pub start_time: SystemTime,
    /// When the final snapshot was taken.
    pub end_time: SystemTime,
    /// Batches received.
    pub batches: u64,
    /// Snapshots the sink rejected along the way.
    pub failed_snapshots: u64,
}

/// Drains a table's telemetry buffer and reports snapshots.
pub struct Aggregator {
    table_id: TableId,
    strategy: StrategyKind,
    buffer: Arc<TelemetryBuffer<Measurement>>,
    receiver: BatchReceiver<Measurement>,
    sink: Arc<dyn StateSink>,
    clock: Arc<ReportClock>,
    deadlock: Arc<AtomicBool>,
    totals: BTreeMap<ActorId, TotalStats>,
    start_time: SystemTime,
    snapshot_interval: Duration,
    poll_timeout: Duration,
    deadlock_timeout: Duration,
    watchdog_tick: Duration,
    batches: u64,
    failed_snapshots: u64,
}

impl Aggregator {
    /// Create an aggregator draining `receiver`, the consumer end of
    /// `buffer`.
    pub fn new(
        table_id: TableId,
        strategy: StrategyKind,
        buffer: Arc<TelemetryBuffer<Measurement>>,
        receiver: BatchReceiver<Measurement>,
        clock: Arc<ReportClock>,
        sink: Arc<dyn StateSink>,
        config: &TableConfig,
    ) -> Self {
        Self {
            table_id,
            strategy,
            buffer,
            receiver,
            sink,
            clock,
            deadlock: Arc::new(AtomicBool::new(false)),
            totals: BTreeMap::new(),
            start_time: SystemTime::now(),
            snapshot_interval: config.snapshot_interval,
            poll_timeout: config.poll_timeout,
            deadlock_timeout: config.deadlock_timeout,
            watchdog_tick: config.watchdog_tick,
            batches: 0,
            failed_snapshots: 0,
        }
    }

    /// A watchdog sharing this aggregator's report clock and deadlock flag.
    pub fn watchdog(&self) -> Watchdog {
        Watchdog::new(
            Arc::clone(&self.clock),
            self.deadlock_timeout,
            self.watchdog_tick,
            Arc::clone(&self.deadlock),
        )
    }

    /// Whether the watchdog has declared a deadlock.
    pub fn deadlock_detected(&self) -> bool {
        self.deadlock.load(Ordering::SeqCst)
    }

    /// Fold one batch into the per-actor totals.
    pub fn record_batch(&mut self, batch: Vec<Measurement>) {
        self.batches += 1;
        trace!(table = %self.table_id, items = batch.len(), "batch received");
        for measurement in &batch {
            self.totals
                .entry(measurement.actor_id)
                .or_insert_with(|| TotalStats::new(measurement.actor_id))
                .record(measurement);
        }
    }

    /// Current per-actor totals, ordered by actor id.
    pub fn totals(&self) -> Vec<(ActorId, TotalStats)> {
        self.totals.iter().map(|(id, stats)| (*id, *stats)).collect()
    }

    /// Consume batches until the buffer is finished and drained.
    ///
    /// Cancelling `table` finishes the buffer; the loop keeps draining
    /// until the batch channel closes, then sends the final snapshot.
    /// Periodic snapshot failures are logged and counted; a failing final
    /// snapshot is returned as an error.
    pub async fn run(mut self, table: CancellationToken) -> Result<AggregateSummary, TableError> {
        debug!(table = %self.table_id, strategy = %self.strategy, "aggregator started");
        let mut next_snapshot = Instant::now() + self.snapshot_interval;
        let mut finishing = false;

        loop {
            tokio::select! {
                _ = table.cancelled(), if !finishing => {
                    finishing = true;
                    self.buffer.finish();
                }
                poll = self.receiver.poll(self.poll_timeout) => match poll {
                    BatchPoll::Batch(batch) => self.record_batch(batch),
                    BatchPoll::Idle => {}
                    BatchPoll::Closed => break,
                },
            }

            if Instant::now() >= next_snapshot {
                next_snapshot += self.snapshot_interval;
                let update = self.snapshot(None);
                if let Err(err) = self.sink.update_state(update).await {
                    self.failed_snapshots += 1;
                    warn!(table = %self.table_id, error = %err, "snapshot rejected by state sink");
                }
            }
        }

        let end_time = SystemTime::now();
        self.sink.update_state(self.snapshot(Some(end_time))).await?;
        debug!(
            table = %self.table_id,
            batches = self.batches,
            deadlock = self.deadlock_detected(),
            "aggregator finished"
        );

        Ok(AggregateSummary {
            totals: self.totals(),
            deadlock_detected: self.deadlock_detected(),
            start_time: self.start_time,
            end_time,
            batches: self.batches,
            failed_snapshots: self.failed_snapshots,
        })
    }

    fn snapshot(&self, end_time: Option<SystemTime>) -> StateUpdate {
        StateUpdate {
            table_id: self.table_id,
            strategy: self.strategy,
            start_time: self.start_time,
            end_time,
            deadlock_detected: self.deadlock_detected(),
            totals: self.totals(),
        }
    }
}
