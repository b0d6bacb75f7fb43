//! Resource acquisition strategies.
//!
//! Every actor owns one [`AcquisitionStrategy`] over the resources it was
//! wired to at construction. The five implementations differ only in how
//! `acquire()` obtains the whole set:
//!
//! | Strategy | Blocks? | Deadlock-free | Notes |
//! |----------|---------|---------------|-------|
//! | [`NaiveStrategy`] | up to a timeout | no | fixed order, circular wait possible |
//! | [`HierarchyStrategy`] | yes | yes | ascending resource id order |
//! | [`ArbitratedStrategy`] | yes | yes | one actor acquiring at a time |
//! | [`OptimisticStrategy`] | never, spins | yes | rollback on contention, may starve |
//! | [`TokenPassingStrategy`] | yes | yes | Chandy–Misra dirty/clean forks |
//!
//! `acquire()` returns an [`Acquisition`] rather than failing when the naive
//! strategy gives up on a lock: timing out is an expected outcome that the
//! runner handles by ending the actor's loop, not a fault.

mod arbitrated;
mod hierarchy;
mod lock_set;
mod naive;
mod optimistic;
mod token_passing;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StrategyError, TableError};
use crate::types::ResourceId;

pub use arbitrated::{Arbitrator, ArbitratedStrategy};
pub use hierarchy::HierarchyStrategy;
pub use naive::NaiveStrategy;
pub use optimistic::OptimisticStrategy;
pub use token_passing::{TokenPassingStrategy, TokenResource, TokenState};

pub(crate) use lock_set::LockSet;

/// Outcome of a call to [`AcquisitionStrategy::acquire`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Every resource in the set is now held by the caller.
    Acquired,

    /// A bounded lock attempt expired. Nothing is held; the caller should
    /// stop its loop. This signals a *possible* deadlock only.
    TimedOut {
        /// The resource that could not be locked in time.
        resource: ResourceId,
        /// How long the attempt waited.
        waited: Duration,
    },
}

/// Algorithm an actor uses to obtain and give back its resources.
pub trait AcquisitionStrategy: Send + fmt::Debug {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Ids of the resources this strategy governs, in acquisition order.
    fn resources(&self) -> Vec<ResourceId>;

    /// Obtain exclusive use of every resource in the set.
    fn acquire(&mut self) -> Result<Acquisition, StrategyError>;

    /// Give back every resource obtained by the last successful `acquire()`.
    fn release(&mut self) -> Result<(), StrategyError>;
}

/// Name of an acquisition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Fixed-order blocking locks with a timeout escape.
    Naive,
    /// Ascending resource id order.
    Hierarchy,
    /// Central arbitrator serializing acquisition.
    Arbitrated,
    /// Try-lock with rollback.
    Optimistic,
    /// Chandy–Misra token passing.
    TokenPassing,
}

impl StrategyKind {
    /// All strategies, in presentation order.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Naive,
        StrategyKind::Hierarchy,
        StrategyKind::Arbitrated,
        StrategyKind::Optimistic,
        StrategyKind::TokenPassing,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Naive => "naive",
            StrategyKind::Hierarchy => "hierarchy",
            StrategyKind::Arbitrated => "arbitrated",
            StrategyKind::Optimistic => "optimistic",
            StrategyKind::TokenPassing => "tokenpassing",
        }
    }

    /// Whether the strategy structurally rules out deadlock.
    pub fn is_deadlock_free(&self) -> bool {
        !matches!(self, StrategyKind::Naive)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = TableError;

    /// Parses canonical names and the classic problem-literature aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "naive" | "problem" => Ok(StrategyKind::Naive),
            "hierarchy" | "dijkstra" => Ok(StrategyKind::Hierarchy),
            "arbitrated" | "arbitrary" | "waiter" => Ok(StrategyKind::Arbitrated),
            "optimistic" | "agile" => Ok(StrategyKind::Optimistic),
            "tokenpassing" | "chandymisra" => Ok(StrategyKind::TokenPassing),
            _ => Err(TableError::UnknownStrategy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical_names() {
        for kind in StrategyKind::ALL {
            let parsed: StrategyKind = kind.as_str().parse().expect("parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("Dijkstra".parse::<StrategyKind>().ok(), Some(StrategyKind::Hierarchy));
        assert_eq!("chandy-misra".parse::<StrategyKind>().ok(), Some(StrategyKind::TokenPassing));
        assert_eq!("token_passing".parse::<StrategyKind>().ok(), Some(StrategyKind::TokenPassing));
        assert_eq!("problem".parse::<StrategyKind>().ok(), Some(StrategyKind::Naive));
        assert_eq!("agile".parse::<StrategyKind>().ok(), Some(StrategyKind::Optimistic));
    }

    #[test]
    fn test_parse_unknown() {
        let err = "bankers".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, TableError::UnknownStrategy(name) if name == "bankers"));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&StrategyKind::TokenPassing).expect("serialize");
        assert_eq!(json, "\"tokenpassing\"");
    }
}
