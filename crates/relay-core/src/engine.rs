//! Engine facade: registration, submission, status, shutdown.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::chain::{ChainExecutor, ChainReceipt};
use crate::channel::{Channel, InMemoryChannel};
use crate::domain::{
    RetryPolicy, TaskId, TaskInvocation, TaskSpec, TaskStatus, WorkflowChain,
};
use crate::error::EngineError;
use crate::registry::{FrozenRegistry, TaskHandler, TaskRegistry};
use crate::store::{InMemoryResultStore, ResultStore};
use crate::worker::WorkerPool;

const DEFAULT_WORKERS: usize = 4;

/// Builds an [`Engine`]: register every handler up front, then `build()`.
/// The registry is frozen at build time; nothing can be registered afterwards.
pub struct EngineBuilder {
    registry: TaskRegistry,
    workers: usize,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: TaskRegistry::new(),
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    /// Register a handler under `name` with its default retry policy.
    pub fn register(
        mut self,
        name: impl Into<crate::domain::TaskName>,
        handler: Arc<dyn TaskHandler>,
        retry: RetryPolicy,
    ) -> Result<Self, EngineError> {
        self.registry.register(name, handler, retry)?;
        Ok(self)
    }

    /// Freeze the registry, spawn the worker pool, and hand back the engine.
    pub fn build(self) -> Engine {
        let channel: Arc<dyn Channel> = Arc::new(InMemoryChannel::new());
        let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
        let registry = self.registry.freeze();

        let pool = WorkerPool::spawn(
            self.workers,
            Arc::clone(&channel),
            registry.clone(),
            Arc::clone(&store),
        );
        let executor = ChainExecutor::new(Arc::clone(&channel), Arc::clone(&store));

        info!(workers = self.workers, "engine started");

        Engine {
            channel,
            store,
            registry,
            executor,
            pool,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-facing view of a task's current state.
///
/// `result` is populated only on SUCCESS, `error` only on FAILURE; while the
/// task is in flight both are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The running engine. Submission and status are non-blocking; execution
/// happens on the worker pool.
pub struct Engine {
    channel: Arc<dyn Channel>,
    store: Arc<dyn ResultStore>,
    registry: FrozenRegistry,
    executor: ChainExecutor,
    pool: WorkerPool,
}

impl Engine {
    /// Submit a workflow chain. Returns as soon as the first step is
    /// enqueued; poll `status()` with the receipt's terminal id.
    ///
    /// Every step name is validated against the registry before anything is
    /// enqueued, so a misspelled name fails the whole submission instead of
    /// stranding a half-run chain.
    pub async fn submit_chain(&self, chain: WorkflowChain) -> Result<ChainReceipt, EngineError> {
        for step in chain.steps() {
            if !self.registry.contains(&step.name) {
                return Err(EngineError::UnknownTask(step.name.clone()));
            }
        }
        self.executor.submit(chain).await
    }

    /// Dispatch a single task outside any chain.
    pub async fn dispatch_task(&self, spec: TaskSpec) -> Result<TaskId, EngineError> {
        if !self.registry.contains(&spec.name) {
            return Err(EngineError::UnknownTask(spec.name.clone()));
        }
        let invocation = TaskInvocation::new(TaskId::generate(), spec);
        let id = invocation.task_id;
        self.store.create(id).await;
        self.channel.enqueue(invocation).await?;
        Ok(id)
    }

    /// Current status of a task (or of a chain, via its terminal id).
    pub async fn status(&self, id: TaskId) -> Result<StatusView, EngineError> {
        let record = self.store.get(id).await?;
        let (result, error) = match record.status {
            TaskStatus::Success => (record.result, None),
            TaskStatus::Failure => (None, record.error),
            _ => (None, None),
        };
        Ok(StatusView {
            task_id: id,
            status: record.status,
            result,
            error,
        })
    }

    /// Block until `id` is terminal and return its final status.
    pub async fn wait(&self, id: TaskId) -> Result<StatusView, EngineError> {
        self.store.wait_terminal(id).await?;
        self.status(id).await
    }

    /// Close the channel and wait for every worker to drain and exit.
    pub async fn shutdown(self) {
        info!("engine shutting down");
        self.channel.close();
        self.pool.shutdown_and_join().await;
    }
}
