//! Table orchestration.
//!
//! [`TableOrchestrator::run`] seats the actors of one strategy, starts one
//! runner thread per actor plus the aggregator and watchdog tasks, and
//! races the two sides:
//!
//! - every actor loop ending first (all timed out, or faulted) cancels the
//!   table so the aggregator drains and reports;
//! - the aggregator ending first (cancellation from the caller, the
//!   watchdog or a fault) leaves the runners to notice the cancelled token
//!   at their next cycle boundary.
//!
//! Either way the loser is awaited before the report is built. When actors
//! faulted, the report travels inside the returned [`TableError`].

mod report;

use std::any::Any;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::actor::{ActorRunner, ExclusionProbe, FaultHandler, RunnerExit, StartGate};
use crate::aggregator::Aggregator;
use crate::config::TableConfig;
use crate::context::SimContext;
use crate::error::{ActorFault, TableError};
use crate::state::StateSink;
use crate::strategy::StrategyKind;
use crate::telemetry::{MeasurementSink, ReportClock, TelemetryBuffer, TelemetrySink};
use crate::types::{ActorId, TableId};

pub use report::{ActorExit, TableReport};

/// Runs tables against one state sink.
pub struct TableOrchestrator {
    config: TableConfig,
    ctx: Arc<SimContext>,
    state: Arc<dyn StateSink>,
    probe: bool,
}

impl TableOrchestrator {
    /// Create an orchestrator with its own id context.
    pub fn new(config: TableConfig, state: Arc<dyn StateSink>) -> Self {
        Self {
            config,
            ctx: SimContext::shared(),
            state,
            probe: false,
        }
    }

    /// Draw actor and resource ids from `ctx`.
    pub fn with_context(mut self, ctx: Arc<SimContext>) -> Self {
        self.ctx = ctx;
        self
    }

    /// Attach an [`ExclusionProbe`] to every actor and report its
    /// violation count.
    pub fn with_exclusion_probe(mut self) -> Self {
        self.probe = true;
        self
    }

    /// The configuration tables are run with.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Run one table until `cancellation` fires, the watchdog declares a
    /// deadlock, an actor faults, or every actor loop ends.
    #[instrument(skip_all, fields(table = %table_id, strategy = %strategy, actors = count))]
    pub async fn run(
        &self,
        table_id: TableId,
        strategy: StrategyKind,
        count: u32,
        cancellation: CancellationToken,
    ) -> Result<TableReport, TableError> {
        let started = Instant::now();
        let mut actors = strategy
            .factory()
            .create_actors(&self.ctx, count, &self.config.actor)?;

        let probe = self.probe.then(|| {
            ExclusionProbe::new(actors.iter().flat_map(|a| a.resources().to_vec()))
        });
        if let Some(probe) = &probe {
            for actor in &mut actors {
                actor.attach_probe(Arc::clone(probe));
            }
        }

        let table = cancellation.child_token();
        let clock = ReportClock::start();
        let (buffer, receiver) = TelemetryBuffer::new(self.config.buffer_capacity);
        let sink: Arc<dyn MeasurementSink> =
            Arc::new(TelemetrySink::new(Arc::clone(&buffer), Arc::clone(&clock)));
        let aggregator = Aggregator::new(
            table_id,
            strategy,
            buffer,
            receiver,
            clock,
            Arc::clone(&self.state),
            &self.config,
        );
        let watchdog = aggregator.watchdog();

        let faults = Arc::new(Mutex::new(Vec::new()));
        let on_fault: FaultHandler = {
            let faults = Arc::clone(&faults);
            let table = table.clone();
            Arc::new(move |fault: ActorFault| {
                faults.lock().push(fault);
                table.cancel();
            })
        };

        let gate = StartGate::new();
        let mut handles = Vec::with_capacity(actors.len());
        for actor in actors {
            let runner = ActorRunner::new(
                actor,
                Arc::clone(&sink),
                table.clone(),
                Arc::clone(&on_fault),
            )
            .with_start_gate(Arc::clone(&gate));
            let id = runner.actor_id();
            match runner.spawn() {
                Ok(handle) => handles.push((id, handle)),
                Err(err) => {
                    table.cancel();
                    gate.open();
                    return Err(TableError::TaskFailed(format!("spawning {id}: {err}")));
                }
            }
        }
        drop(sink);

        let watchdog_task = tokio::spawn(watchdog.run(table.clone()));
        let mut aggregator_task = tokio::spawn(aggregator.run(table.clone()));
        let mut actors_task = tokio::task::spawn_blocking(move || join_runners(handles));

        gate.open();
        info!("table started");

        let (joined, aggregated) = tokio::select! {
            joined = &mut actors_task => {
                table.cancel();
                (joined, (&mut aggregator_task).await)
            }
            aggregated = &mut aggregator_task => {
                table.cancel();
                ((&mut actors_task).await, aggregated)
            }
        };
        let watchdog_fired = watchdog_task
            .await
            .map_err(|err| TableError::TaskFailed(format!("watchdog: {err}")))?;

        let joined = joined.map_err(|err| TableError::TaskFailed(format!("actors: {err}")))?;
        let mut faults = std::mem::take(&mut *faults.lock());
        let mut exits = Vec::with_capacity(joined.len());
        for (actor, result) in joined {
            match result {
                Ok(exit) => exits.push((actor, exit)),
                Err(message) => {
                    error!(%actor, %message, "actor thread panicked");
                    faults.push(ActorFault::Panicked { actor, message });
                }
            }
        }
        faults.sort_by_key(ActorFault::actor);

        let summary = match aggregated
            .map_err(|err| TableError::TaskFailed(format!("aggregator: {err}")))?
        {
            Ok(summary) => summary,
            Err(err) => return Err(TableError::from_faults(faults).unwrap_or(err)),
        };

        let report = TableReport {
            table_id,
            strategy,
            deadlock_detected: summary.deadlock_detected,
            totals: summary.totals,
            exits: exits
                .into_iter()
                .map(|(actor, exit)| (actor, exit.into()))
                .collect(),
            elapsed: started.elapsed(),
            exclusion_violations: probe.map(|p| p.violations()),
        };
        info!(
            cycles = report.total_cycles(),
            deadlock = report.deadlock_detected,
            watchdog_fired,
            faults = faults.len(),
            "table finished"
        );
        match TableError::from_faults(faults) {
            Some(err) => Err(err.with_report(report)),
            None => Ok(report),
        }
    }
}

type Joined = Vec<(ActorId, Result<RunnerExit, String>)>;

fn join_runners(handles: Vec<(ActorId, JoinHandle<RunnerExit>)>) -> Joined {
    handles
        .into_iter()
        .map(|(id, handle)| (id, handle.join().map_err(panic_message)))
        .collect()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
