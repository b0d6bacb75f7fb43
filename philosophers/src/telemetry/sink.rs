//! The measurement sink wired into a table's actors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::telemetry::{Measurement, MeasurementSink, TelemetryBuffer};

/// Monotonic record of the most recent report, shared between the producing
/// sink and the watchdog.
///
/// The last report is kept as nanoseconds since the clock's origin so it
/// fits in one atomic. Before the first report the origin itself counts as
/// the last report.
#[derive(Debug)]
pub struct ReportClock {
    origin: Instant,
    last_report_nanos: AtomicU64,
}

impl ReportClock {
    /// Start a clock at the current instant.
    pub fn start() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            last_report_nanos: AtomicU64::new(0),
        })
    }

    /// Record a report happening now.
    pub fn stamp(&self) {
        let nanos = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_report_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    /// Time elapsed since the last report.
    pub fn since_last_report(&self) -> Duration {
        let last = Duration::from_nanos(self.last_report_nanos.load(Ordering::Relaxed));
        self.origin.elapsed().saturating_sub(last)
    }

    /// Time elapsed since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Sink that stamps the report clock and pushes into a telemetry buffer.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    buffer: Arc<TelemetryBuffer<Measurement>>,
    clock: Arc<ReportClock>,
}

impl TelemetrySink {
    /// Create a sink over `buffer` stamping `clock`.
    pub fn new(buffer: Arc<TelemetryBuffer<Measurement>>, clock: Arc<ReportClock>) -> Self {
        Self { buffer, clock }
    }
}

impl MeasurementSink for TelemetrySink {
    fn report(&self, measurement: Measurement) {
        self.clock.stamp();
        self.buffer.push(measurement);
    }
}
