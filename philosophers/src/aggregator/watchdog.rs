//! Timing-based deadlock watchdog.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::telemetry::ReportClock;

/// Declares a deadlock when no measurement has been reported for longer
/// than the timeout, and cancels the table.
///
/// Staleness is measured from the time producers last reported, not from
/// when the aggregator drained the batch, so a slow consumer cannot trip
/// the watchdog.
#[derive(Debug, Clone)]
pub struct Watchdog {
    clock: Arc<ReportClock>,
    timeout: Duration,
    tick: Duration,
    detected: Arc<AtomicBool>,
}

impl Watchdog {
    /// Create a watchdog over `clock`, raising `detected` on expiry.
    pub fn new(
        clock: Arc<ReportClock>,
        timeout: Duration,
        tick: Duration,
        detected: Arc<AtomicBool>,
    ) -> Self {
        Self {
            clock,
            timeout,
            tick: tick.max(Duration::from_millis(1)),
            detected,
        }
    }

    /// Whether the reports are currently stale.
    pub fn is_stale(&self) -> bool {
        self.clock.since_last_report() > self.timeout
    }

    /// Watch until the table is cancelled or a deadlock is declared.
    /// Returns whether this watchdog declared the deadlock.
    pub async fn run(self, table: CancellationToken) -> bool {
        let mut ticks = tokio::time::interval(self.tick);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = table.cancelled() => {
                    debug!("watchdog stopped");
                    return false;
                }
                _ = ticks.tick() => {
                    if self.is_stale() {
                        let stale = self.clock.since_last_report();
                        warn!(?stale, timeout = ?self.timeout, "no report within the deadlock timeout, cancelling table");
                        self.detected.store(true, Ordering::SeqCst);
                        table.cancel();
                        return true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fires_when_reports_stop() {
        let clock = ReportClock::start();
        let detected = Arc::new(AtomicBool::new(false));
        let table = CancellationToken::new();
        let watchdog = Watchdog::new(
            clock,
            Duration::from_millis(30),
            Duration::from_millis(5),
            Arc::clone(&detected),
        );

        assert!(watchdog.run(table.clone()).await);
        assert!(detected.load(Ordering::SeqCst));
        assert!(table.is_cancelled());
    }

    #[tokio::test]
    async fn test_stays_quiet_while_reports_flow() {
        let clock = ReportClock::start();
        let detected = Arc::new(AtomicBool::new(false));
        let table = CancellationToken::new();
        let watchdog = Watchdog::new(
            Arc::clone(&clock),
            Duration::from_millis(200),
            Duration::from_millis(5),
            Arc::clone(&detected),
        );
        let handle = tokio::spawn(watchdog.run(table.clone()));

        for _ in 0..10 {
            clock.stamp();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        table.cancel();

        assert!(!handle.await.expect("watchdog task"));
        assert!(!detected.load(Ordering::SeqCst));
    }
}
