//! Error types for the dining table simulator.
//!
//! Three kinds of trouble exist and only two of them are errors:
//!
//! - A naive actor timing out on a lock is *not* an error. It is the
//!   [`Acquisition::TimedOut`](crate::strategy::Acquisition::TimedOut)
//!   signal and ends that actor's loop quietly.
//! - A watchdog-declared deadlock is *not* an error either. It is the
//!   `deadlock_detected` flag on snapshots and on the final report.
//! - Everything else raised by actor logic is an [`ActorFault`], collected by
//!   the orchestrator and returned as a [`TableError`].

use thiserror::Error;

use crate::strategy::StrategyKind;
use crate::table::TableReport;
use crate::types::{ActorId, ResourceId};

/// Errors raised by an acquisition strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    /// The token passing protocol found a resource in a state it can never
    /// legally be in at that point.
    #[error("protocol violation on {resource} by {actor}: {detail}")]
    ProtocolViolation {
        /// Resource found in the illegal state.
        resource: ResourceId,
        /// Actor that found it.
        actor: ActorId,
        /// What was wrong with it.
        detail: String,
    },

    /// `release()` was called without a matching successful `acquire()`.
    #[error("{actor} released resources it does not hold")]
    NotHeld {
        /// Actor that called `release()`.
        actor: ActorId,
    },
}

/// A fault that ended one actor's loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorFault {
    /// The strategy returned an error.
    #[error("{actor} failed: {source}")]
    Strategy {
        /// Actor whose strategy failed.
        actor: ActorId,
        /// The strategy error.
        #[source]
        source: StrategyError,
    },

    /// The actor thread panicked.
    #[error("{actor} panicked: {message}")]
    Panicked {
        /// Actor whose thread panicked.
        actor: ActorId,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl ActorFault {
    /// The actor whose loop ended.
    pub fn actor(&self) -> ActorId {
        match self {
            ActorFault::Strategy { actor, .. } | ActorFault::Panicked { actor, .. } => *actor,
        }
    }
}

/// Errors from a state sink.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The sink is not accepting updates.
    #[error("state sink unavailable")]
    Unavailable,

    /// The update could not be stored.
    #[error("state update failed: {0}")]
    UpdateFailed(String),
}

/// Errors returned by a table run.
#[derive(Debug, Error)]
pub enum TableError {
    /// The strategy name is not one of the known strategies.
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A table needs at least two actors so that every resource is shared.
    #[error("invalid actor count {count} for {strategy} (need at least 2)")]
    InvalidActorCount {
        /// Strategy the table was requested for.
        strategy: StrategyKind,
        /// Requested number of actors.
        count: u32,
    },

    /// Exactly one actor faulted.
    #[error("actor fault: {fault}")]
    ActorFault {
        /// The fault.
        #[source]
        fault: ActorFault,
        /// Report of the run up to teardown, when the aggregator finished.
        report: Option<Box<TableReport>>,
    },

    /// More than one actor faulted.
    #[error("{} actors faulted: {}", .faults.len(), display_faults(.faults))]
    ActorFaults {
        /// The faults, ordered by actor id.
        faults: Vec<ActorFault>,
        /// Report of the run up to teardown, when the aggregator finished.
        report: Option<Box<TableReport>>,
    },

    /// The state sink rejected a snapshot.
    #[error("state sink error: {0}")]
    Sink(#[from] SinkError),

    /// A background task of the orchestrator could not be joined.
    #[error("table task failed: {0}")]
    TaskFailed(String),
}

impl TableError {
    /// Build the error for a set of collected actor faults, or `None` when
    /// the set is empty.
    pub fn from_faults(mut faults: Vec<ActorFault>) -> Option<Self> {
        match faults.len() {
            0 => None,
            1 => faults
                .pop()
                .map(|fault| TableError::ActorFault { fault, report: None }),
            _ => Some(TableError::ActorFaults {
                faults,
                report: None,
            }),
        }
    }

    /// Attach the end-of-run report to a fault error. Other errors are
    /// returned unchanged.
    pub fn with_report(self, report: TableReport) -> Self {
        match self {
            TableError::ActorFault { fault, .. } => TableError::ActorFault {
                fault,
                report: Some(Box::new(report)),
            },
            TableError::ActorFaults { faults, .. } => TableError::ActorFaults {
                faults,
                report: Some(Box::new(report)),
            },
            other => other,
        }
    }

    /// The end-of-run report carried by a fault error.
    pub fn report(&self) -> Option<&TableReport> {
        match self {
            TableError::ActorFault { report, .. } | TableError::ActorFaults { report, .. } => {
                report.as_deref()
            }
            _ => None,
        }
    }
}

fn display_faults(faults: &[ActorFault]) -> String {
    faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
