//! State sink abstraction.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::state::StateUpdate;

/// Receives table snapshots from the aggregator.
///
/// Called once per snapshot interval and once more when the run ends. The
/// final update carries an `end_time`.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Store one snapshot.
    async fn update_state(&self, update: StateUpdate) -> Result<(), SinkError>;
}
