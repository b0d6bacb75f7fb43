//! # Philosophers
//!
//! Dining philosophers under five interchangeable resource acquisition
//! strategies, with lock-free timing telemetry and a timing-based deadlock
//! watchdog.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ TableOrchestrator                                           │
//! │   ActorFactory ──► Actor × N (one OS thread each)           │
//! │                     │ acquire → eat → release → think       │
//! │                     ▼                                       │
//! │              TelemetrySink ──► TelemetryBuffer (lock-free)  │
//! │                                     │ batches               │
//! │                                     ▼                       │
//! │   Watchdog ◄── ReportClock      Aggregator ──► StateSink    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Strategies
//!
//! | Name | Module | Deadlock-free |
//! |------|--------|---------------|
//! | `naive` | [`strategy::NaiveStrategy`] | no |
//! | `hierarchy` | [`strategy::HierarchyStrategy`] | yes |
//! | `arbitrated` | [`strategy::ArbitratedStrategy`] | yes |
//! | `optimistic` | [`strategy::OptimisticStrategy`] | yes |
//! | `tokenpassing` | [`strategy::TokenPassingStrategy`] | yes |
//!
//! ## Quick Start
//!
//! ```ignore
//! use philosophers::prelude::*;
//!
//! let repo = Arc::new(InMemoryStateRepository::new());
//! let orchestrator = TableOrchestrator::new(TableConfig::standalone(), repo);
//! let report = orchestrator
//!     .run(TableId(1), StrategyKind::Hierarchy, 5, CancellationToken::new())
//!     .await?;
//! println!("{report}");
//! ```

#![warn(missing_docs)]

pub mod actor;
pub mod aggregator;
pub mod config;
pub mod context;
pub mod error;
pub mod prelude;
pub mod resource;
pub mod state;
pub mod strategy;
pub mod table;
pub mod telemetry;
pub mod types;

pub use config::{ActorConfig, TableConfig};
pub use context::SimContext;
pub use error::{ActorFault, SinkError, StrategyError, TableError};
pub use table::{TableOrchestrator, TableReport};
pub use types::{ActorId, ResourceId, TableId};
