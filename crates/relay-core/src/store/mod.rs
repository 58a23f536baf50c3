//! Result store: identifier -> current status and outcome.

mod memory;

pub use memory::InMemoryResultStore;

use async_trait::async_trait;

use crate::domain::{ResultRecord, TaskId};
use crate::error::EngineError;

/// Result store port (interface).
///
/// A given id is only ever written by one worker at a time (an invocation
/// executes on exactly one worker), but different ids race freely, so
/// implementations must be safe for concurrent access. `NotFound` is the only
/// error a well-formed caller sees.
///
/// Status transitions are monotonic: once a record is terminal, further
/// updates are dropped. This is what makes channel redelivery harmless.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Initialize a PENDING record for `id`. Idempotent.
    async fn create(&self, id: TaskId);

    /// Point lookup. Never mutates.
    async fn get(&self, id: TaskId) -> Result<ResultRecord, EngineError>;

    /// Mark one execution started (increments the record's attempt count).
    async fn mark_started(&self, id: TaskId) -> Result<(), EngineError>;

    /// Record a transient failure awaiting re-enqueue.
    async fn mark_retry(&self, id: TaskId, error: String) -> Result<(), EngineError>;

    /// Terminal: success with the handler's return value.
    async fn mark_success(&self, id: TaskId, result: serde_json::Value)
    -> Result<(), EngineError>;

    /// Terminal: failure with an error summary.
    async fn mark_failure(&self, id: TaskId, error: String) -> Result<(), EngineError>;

    /// Completion notification: resolves once the record for `id` is
    /// terminal (immediately if it already is). Drives the chain executor's
    /// step handoff without busy polling.
    async fn wait_terminal(&self, id: TaskId) -> Result<ResultRecord, EngineError>;
}
