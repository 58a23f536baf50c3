//! Chain executor: runs an ordered list of task specs as one workflow.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::domain::{TaskId, TaskInvocation, TaskStatus, WorkflowChain, WorkflowId};
use crate::error::EngineError;
use crate::store::ResultStore;

/// Handle returned by a chain submission.
///
/// `terminal` is the stable identifier callers poll: the pre-assigned id of
/// the chain's last invocation, which resolves to the final outcome of the
/// whole chain (on failure of any step, failure is propagated to it).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChainReceipt {
    pub workflow_id: WorkflowId,
    pub terminal: TaskId,
}

/// Executes workflow chains: dispatches one step at a time, threading each
/// step's result into the next step's arguments.
pub struct ChainExecutor {
    channel: Arc<dyn Channel>,
    store: Arc<dyn ResultStore>,
}

impl ChainExecutor {
    pub fn new(channel: Arc<dyn Channel>, store: Arc<dyn ResultStore>) -> Self {
        Self { channel, store }
    }

    /// Submit a chain: dispatch the first step and return immediately.
    ///
    /// All step ids are allocated and their PENDING records created up front,
    /// so polling the terminal id right after submit sees PENDING rather than
    /// NotFound. A spawned driver dispatches step N+1 only once step N's
    /// record is terminal, and never dispatches past a failed step.
    pub async fn submit(&self, chain: WorkflowChain) -> Result<ChainReceipt, EngineError> {
        let workflow_id = WorkflowId::generate();
        let step_ids: Vec<TaskId> = chain.steps().iter().map(|_| TaskId::generate()).collect();
        let terminal = *step_ids.last().expect("chain is non-empty");

        for id in &step_ids {
            self.store.create(*id).await;
        }

        let first = TaskInvocation::chained(
            step_ids[0],
            chain.steps()[0].clone(),
            workflow_id,
            None,
        );
        self.channel.enqueue(first).await?;

        info!(
            workflow_id = %workflow_id,
            terminal_task_id = %terminal,
            steps = chain.len(),
            "chain submitted"
        );

        let driver = ChainDriver {
            channel: Arc::clone(&self.channel),
            store: Arc::clone(&self.store),
            workflow_id,
            chain,
            step_ids,
        };
        tokio::spawn(driver.run());

        Ok(ChainReceipt {
            workflow_id,
            terminal,
        })
    }
}

/// Per-chain supervising task. Waits on completion notifications only; it
/// never occupies a worker and never polls.
struct ChainDriver {
    channel: Arc<dyn Channel>,
    store: Arc<dyn ResultStore>,
    workflow_id: WorkflowId,
    chain: WorkflowChain,
    step_ids: Vec<TaskId>,
}

impl ChainDriver {
    async fn run(self) {
        for index in 0..self.step_ids.len() {
            let step_id = self.step_ids[index];
            let record = match self.store.wait_terminal(step_id).await {
                Ok(record) => record,
                Err(err) => {
                    warn!(workflow_id = %self.workflow_id, task_id = %step_id, %err, "chain driver lost its step record");
                    return;
                }
            };

            match record.status {
                TaskStatus::Success => {
                    let is_last = index + 1 == self.step_ids.len();
                    if is_last {
                        info!(workflow_id = %self.workflow_id, "chain completed");
                        return;
                    }
                    debug!(
                        workflow_id = %self.workflow_id,
                        step = index + 1,
                        "step succeeded, dispatching next"
                    );
                    let next = TaskInvocation::chained(
                        self.step_ids[index + 1],
                        self.chain.steps()[index + 1].clone(),
                        self.workflow_id,
                        record.result,
                    );
                    if let Err(err) = self.channel.enqueue(next).await {
                        warn!(workflow_id = %self.workflow_id, %err, "chain dispatch failed");
                        self.fail_remaining(index + 1, format!("dispatch aborted: {err}"))
                            .await;
                        return;
                    }
                }
                TaskStatus::Failure => {
                    let summary = record
                        .error
                        .unwrap_or_else(|| "unknown error".to_string());
                    warn!(
                        workflow_id = %self.workflow_id,
                        step = index + 1,
                        error = %summary,
                        "step failed, chain aborted"
                    );
                    self.fail_remaining(
                        index + 1,
                        format!(
                            "upstream step {} ({}) failed: {summary}",
                            index + 1,
                            self.chain.steps()[index].name
                        ),
                    )
                    .await;
                    return;
                }
                // wait_terminal only resolves on terminal statuses.
                other => {
                    warn!(workflow_id = %self.workflow_id, status = ?other, "non-terminal completion notification");
                    return;
                }
            }
        }
    }

    /// Fail-fast propagation: mark every step from `from` onward (terminal id
    /// included) FAILURE; none of them will ever be dispatched.
    async fn fail_remaining(&self, from: usize, summary: String) {
        for id in &self.step_ids[from..] {
            if let Err(err) = self.store.mark_failure(*id, summary.clone()).await {
                warn!(workflow_id = %self.workflow_id, task_id = %id, %err, "failure propagation skipped a record");
            }
        }
    }
}
