//! Configuration for a table run and for the actors seated at it.

use std::time::Duration;

/// Per-actor behaviour knobs.
#[derive(Clone, Debug)]
pub struct ActorConfig {
    /// Busy-loop iterations spent in the eating phase (resources held).
    pub eat_work: u32,

    /// Busy-loop iterations spent in the thinking phase (resources free).
    pub think_work: u32,

    /// Pause between locking successive resources in the blocking
    /// strategies (naive, hierarchy, arbitrated).
    ///
    /// Zero by default. A non-zero value widens the window in which a
    /// circular wait can form, which makes the naive deadlock reproducible.
    pub reach_delay: Duration,

    /// Bounded wait per resource for the naive strategy before it gives up
    /// and releases what it holds.
    pub naive_lock_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            eat_work: 50,
            think_work: 50,
            reach_delay: Duration::ZERO,
            naive_lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Configuration for one table run.
///
/// Two timeouts are involved in deadlock handling and they are
/// deliberately independent:
///
/// - [`deadlock_timeout`](Self::deadlock_timeout) drives the watchdog. It is
///   the only source of the `deadlock_detected` flag in snapshots and in the
///   final report.
/// - [`ActorConfig::naive_lock_timeout`] only unblocks naive actors so that
///   cancellation can complete. It never marks the run as deadlocked.
#[derive(Clone, Debug)]
pub struct TableConfig {
    /// Staleness after which the watchdog declares a deadlock.
    pub deadlock_timeout: Duration,

    /// How often the watchdog compares the last report time against
    /// `deadlock_timeout`.
    pub watchdog_tick: Duration,

    /// Interval between periodic snapshots sent to the state sink.
    pub snapshot_interval: Duration,

    /// Bounded wait for a telemetry batch per aggregator poll.
    pub poll_timeout: Duration,

    /// Number of measurements per telemetry batch.
    pub buffer_capacity: usize,

    /// Behaviour of every actor at the table.
    pub actor: ActorConfig,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::standalone()
    }
}

impl TableConfig {
    /// Configuration for an in-process run with no persistence round trips.
    pub fn standalone() -> Self {
        Self {
            deadlock_timeout: Duration::from_millis(500),
            watchdog_tick: Duration::from_millis(100),
            snapshot_interval: Duration::from_millis(1000),
            poll_timeout: Duration::from_millis(1000),
            buffer_capacity: 100_000,
            actor: ActorConfig::default(),
        }
    }

    /// Configuration for runs whose snapshots cross a persistence boundary,
    /// where reporting can stall for longer without a real deadlock.
    pub fn persisted() -> Self {
        Self {
            deadlock_timeout: Duration::from_millis(5000),
            watchdog_tick: Duration::from_millis(500),
            ..Self::standalone()
        }
    }

    /// Set the watchdog staleness timeout.
    pub fn with_deadlock_timeout(mut self, timeout: Duration) -> Self {
        self.deadlock_timeout = timeout;
        self
    }

    /// Set the watchdog polling tick.
    pub fn with_watchdog_tick(mut self, tick: Duration) -> Self {
        self.watchdog_tick = tick;
        self
    }

    /// Set the snapshot interval.
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the telemetry batch capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the naive strategy's per-resource lock timeout.
    pub fn with_naive_lock_timeout(mut self, timeout: Duration) -> Self {
        self.actor.naive_lock_timeout = timeout;
        self
    }

    /// Set the pause between successive resource locks.
    pub fn with_reach_delay(mut self, delay: Duration) -> Self {
        self.actor.reach_delay = delay;
        self
    }

    /// Set the eating and thinking work per cycle.
    pub fn with_work(mut self, eat_work: u32, think_work: u32) -> Self {
        self.actor.eat_work = eat_work;
        self.actor.think_work = think_work;
        self
    }
}
