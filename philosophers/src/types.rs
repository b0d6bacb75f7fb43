//! Core identifier types for tables, actors and resources.
//!
//! All three are thin `u64` newtypes. Actor and resource ids are handed out
//! by the counters of a [`SimContext`](crate::context::SimContext), so they
//! are unique for the lifetime of that context and strictly increasing in
//! creation order. The hierarchy strategy and the token passing ownership
//! rule both depend on that ordering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one simulated actor (a philosopher at the table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Identifies one shared resource (a fork).
///
/// Ordering on `ResourceId` is the global lock order used by the
/// hierarchy strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res-{}", self.0)
    }
}

/// Identifies one table run. Chosen by the caller of
/// [`TableOrchestrator::run`](crate::table::TableOrchestrator::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table-{:016x}", self.0)
    }
}
