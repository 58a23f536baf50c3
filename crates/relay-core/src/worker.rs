//! Worker pool: pull loop, handler execution, retry/failure decisions.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::domain::{TaskId, TaskInvocation};
use crate::error::{EngineError, TaskError};
use crate::registry::FrozenRegistry;
use crate::store::ResultStore;

/// Worker pool handle.
/// - `request_shutdown()` stops the pull loops after their current task
/// - `shutdown_and_join()` waits for every worker to exit
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers, each running an independent pull loop.
    pub fn spawn(
        n: usize,
        channel: Arc<dyn Channel>,
        registry: FrozenRegistry,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let channel = Arc::clone(&channel);
            let registry = registry.clone();
            let store = Arc::clone(&store);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, channel, registry, store, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers. In-flight handler execution is not
    /// cancelled; workers just stop taking new messages.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    channel: Arc<dyn Channel>,
    registry: FrozenRegistry,
    store: Arc<dyn ResultStore>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // dequeue blocks, so race it against shutdown
        let invocation = tokio::select! {
            _ = shutdown_rx.changed() => continue,
            invocation = channel.dequeue() => invocation,
        };

        let Some(invocation) = invocation else {
            break; // channel closed
        };

        execute_invocation(worker_id, &channel, &registry, &store, invocation).await;
    }
}

/// Run one invocation through the per-task state machine:
/// STARTED, then SUCCESS / RETRY (scheduled re-enqueue) / FAILURE.
async fn execute_invocation(
    worker_id: usize,
    channel: &Arc<dyn Channel>,
    registry: &FrozenRegistry,
    store: &Arc<dyn ResultStore>,
    invocation: TaskInvocation,
) {
    let id = invocation.task_id;

    // At-least-once tolerance: skip redelivered messages whose record is
    // already terminal instead of re-running the handler.
    match store.get(id).await {
        Ok(record) if record.status.is_terminal() => {
            debug!(worker_id, task_id = %id, "skipping redelivery of completed invocation");
            return;
        }
        Ok(_) => {}
        Err(err) => {
            warn!(worker_id, task_id = %id, %err, "dequeued invocation with no record");
            return;
        }
    }

    if let Err(err) = store.mark_started(id).await {
        warn!(worker_id, task_id = %id, %err, "failed to mark started");
        return;
    }
    let attempt = invocation.attempt + 1;

    let (handler, default_retry) = match registry.resolve(&invocation.spec.name) {
        Ok(resolved) => resolved,
        Err(err) => {
            // Submission validates names, so this only fires for messages
            // from a foreign producer.
            warn!(worker_id, task_id = %id, %err, "unresolvable task name");
            warn_on_store_error(id, store.mark_failure(id, err.to_string()).await);
            return;
        }
    };
    let retry = invocation
        .spec
        .retry
        .clone()
        .unwrap_or(default_retry);

    debug!(
        worker_id,
        task_id = %id,
        task = %invocation.spec.name,
        attempt,
        max_attempts = retry.max_attempts,
        "executing"
    );

    match handler.run(&invocation.args).await {
        Ok(value) => {
            info!(worker_id, task_id = %id, task = %invocation.spec.name, attempt, "succeeded");
            warn_on_store_error(id, store.mark_success(id, value).await);
        }
        Err(TaskError::Permanent(summary)) => {
            warn!(worker_id, task_id = %id, task = %invocation.spec.name, error = %summary, "permanent failure");
            warn_on_store_error(id, store.mark_failure(id, summary).await);
        }
        Err(TaskError::Transient(summary)) => {
            if attempt < retry.max_attempts {
                let delay = retry.next_delay(attempt);
                warn!(
                    worker_id,
                    task_id = %id,
                    task = %invocation.spec.name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %summary,
                    "transient failure, retry scheduled"
                );
                warn_on_store_error(id, store.mark_retry(id, summary).await);
                // Scheduled re-enqueue: this worker is free immediately.
                if let Err(err) = channel
                    .enqueue_after(invocation.for_retry(attempt), delay)
                    .await
                {
                    warn!(worker_id, task_id = %id, %err, "re-enqueue failed");
                    warn_on_store_error(
                        id,
                        store.mark_failure(id, format!("retry aborted: {err}")).await,
                    );
                }
            } else {
                warn!(
                    worker_id,
                    task_id = %id,
                    task = %invocation.spec.name,
                    attempt,
                    error = %summary,
                    "retry budget exhausted"
                );
                warn_on_store_error(id, store.mark_failure(id, summary).await);
            }
        }
    }
}

fn warn_on_store_error(id: TaskId, result: Result<(), EngineError>) {
    if let Err(err) = result {
        warn!(task_id = %id, %err, "result store update failed");
    }
}
