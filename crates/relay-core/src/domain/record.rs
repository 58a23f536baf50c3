//! Task status state machine and the per-invocation result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a task invocation.
///
/// Transitions:
/// - Pending -> Started -> Success
/// - Pending -> Started -> Retry -> (Pending | Started) ... until the budget runs out
/// - Pending -> Started -> Failure
/// - Pending -> Failure (chain fail-fast: a step skipped after an upstream failure)
///
/// Success and Failure are terminal. Wire names are SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Started,
    Retry,
    Success,
    Failure,
}

impl TaskStatus {
    /// Is this a terminal status (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }

    /// Is `self -> next` a legal transition?
    pub fn can_transition(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match self {
            Pending => matches!(next, Started | Failure),
            Started => matches!(next, Success | Retry | Failure),
            // A re-enqueued invocation may be observed as Pending again or go
            // straight to Started when a worker picks it up.
            Retry => matches!(next, Pending | Started),
            Success | Failure => false,
        }
    }
}

/// Current state of one tracked identifier.
///
/// Created on dispatch (Pending), mutated only by the worker and the chain
/// executor. `result` is present only on Success; `error` holds the summary
/// on Retry/Failure. `attempts` reflects the number of executions started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub status: TaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResultRecord {
    pub fn pending() -> Self {
        let now = Utc::now();
        Self {
            status: TaskStatus::Pending,
            result: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark one execution started (increments `attempts`).
    pub fn mark_started(&mut self) {
        self.status = TaskStatus::Started;
        self.attempts += 1;
        self.updated_at = Utc::now();
    }

    pub fn mark_success(&mut self, result: serde_json::Value) {
        self.status = TaskStatus::Success;
        self.result = Some(result);
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_retry(&mut self, error: String) {
        self.status = TaskStatus::Retry;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }

    pub fn mark_failure(&mut self, error: String) {
        self.status = TaskStatus::Failure;
        self.error = Some(error);
        self.updated_at = Utc::now();
    }
}
