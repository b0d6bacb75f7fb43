//! Common imports for running tables.

pub use crate::actor::{Actor, ActorFactory, ExclusionProbe};
pub use crate::aggregator::TotalStats;
pub use crate::config::{ActorConfig, TableConfig};
pub use crate::context::SimContext;
pub use crate::error::{ActorFault, SinkError, StrategyError, TableError};
pub use crate::state::{InMemoryStateRepository, StateSink, StateUpdate};
pub use crate::strategy::{Acquisition, AcquisitionStrategy, StrategyKind};
pub use crate::table::{TableOrchestrator, TableReport};
pub use crate::telemetry::{Measurement, MeasurementSink};
pub use crate::types::{ActorId, ResourceId, TableId};

pub use async_trait::async_trait;
pub use std::sync::Arc;
pub use std::time::Duration;
pub use tokio_util::sync::CancellationToken;

/// Result of a table run.
pub type Result<T> = std::result::Result<T, TableError>;
