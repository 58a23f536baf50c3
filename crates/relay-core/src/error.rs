//! Engine and handler error taxonomy.

use thiserror::Error;

use crate::domain::{TaskId, TaskName};

/// Errors surfaced by the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Registry miss. Programmer error, fatal at dispatch time.
    #[error("unknown task: {0}")]
    UnknownTask(TaskName),

    #[error("duplicate task registration: {0}")]
    DuplicateTask(TaskName),

    /// Status query for an identifier the store never saw.
    #[error("no record for {0}")]
    NotFound(TaskId),

    #[error("workflow chain must contain at least one step")]
    EmptyChain,

    #[error("channel is closed")]
    ChannelClosed,
}

/// Errors returned by task handlers.
///
/// Transient failures are retried up to the policy limit and never surface to
/// the caller unless the budget is exhausted. Permanent failures go straight
/// to a terminal FAILURE.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Permanent(String),
}

impl TaskError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }
}
