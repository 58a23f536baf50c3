//! Message channel: FIFO transport between producers and workers.

mod memory;

pub use memory::InMemoryChannel;

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::TaskInvocation;
use crate::error::EngineError;

/// Channel port (interface).
///
/// Delivery is at-least-once: a message may be redelivered after a worker
/// crash, so consumers must tolerate seeing an invocation whose record is
/// already terminal. No cross-task ordering is guaranteed; chain steps are
/// causally ordered by the executor, which only enqueues step N+1 after step
/// N's record is terminal.
///
/// The in-memory implementation is the development/reference transport; this
/// trait is the seam for a broker-backed one.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Enqueue an invocation for immediate delivery.
    async fn enqueue(&self, invocation: TaskInvocation) -> Result<(), EngineError>;

    /// Enqueue an invocation after `delay` (backoff re-enqueue). Returns
    /// immediately; the caller is never blocked for the delay.
    async fn enqueue_after(
        &self,
        invocation: TaskInvocation,
        delay: Duration,
    ) -> Result<(), EngineError>;

    /// Take one invocation, waiting until a message is available.
    /// Returns `None` once the channel has been closed.
    async fn dequeue(&self) -> Option<TaskInvocation>;

    /// Close the channel: wakes all blocked `dequeue` calls and makes further
    /// enqueues fail with `ChannelClosed`.
    fn close(&self);
}
