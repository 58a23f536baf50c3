use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};
use tracing::{error, info};

use relay_core::storage::{BlobStore, MemoryBlobStore};
use relay_core::{
    EngineBuilder, EngineConfig, RetryPolicy, TaskError, TaskHandler, TaskSpec, TaskStatus,
    WorkflowChain,
};

/// Adds its two arguments. Fails transiently the first few times to show the
/// retry machinery in the logs.
struct AddHandler {
    remaining_failures: AtomicU32,
}

impl AddHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl TaskHandler for AddHandler {
    async fn run(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, TaskError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(TaskError::transient(format!(
                "intentional failure (left={left})"
            )));
        }

        let a = args[0].as_i64().ok_or_else(|| TaskError::permanent("bad arg"))?;
        let b = args[1].as_i64().ok_or_else(|| TaskError::permanent("bad arg"))?;
        Ok(serde_json::json!(a + b))
    }
}

struct MultiplyHandler;

#[async_trait]
impl TaskHandler for MultiplyHandler {
    async fn run(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, TaskError> {
        let x = args[0].as_i64().ok_or_else(|| TaskError::permanent("bad arg"))?;
        let y = args[1].as_i64().ok_or_else(|| TaskError::permanent("bad arg"))?;
        Ok(serde_json::json!(x * y))
    }
}

/// Writes the carried result to the blob store under a fresh key and passes
/// the value through.
struct PersistHandler {
    blobs: Arc<dyn BlobStore>,
}

#[async_trait]
impl TaskHandler for PersistHandler {
    async fn run(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, TaskError> {
        let value = args
            .first()
            .cloned()
            .ok_or_else(|| TaskError::permanent("nothing to persist"))?;
        let body = serde_json::to_vec(&serde_json::json!({ "value": value }))
            .map_err(|e| TaskError::permanent(e.to_string()))?;
        let path = format!("results/{}.json", ulid::Ulid::new());
        self.blobs
            .put(&path, body, "application/json")
            .await
            .map_err(|e| TaskError::transient(e.to_string()))?;
        Ok(value)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "configuration error");
            std::process::exit(1);
        }
    };

    // Operands for the demo workflow, e.g. `relay-cli 4 7`.
    let mut args = std::env::args().skip(1);
    let a: i64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(2);
    let b: i64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(3);

    let blobs = Arc::new(MemoryBlobStore::new());

    let engine = EngineBuilder::new()
        .workers(config.workers)
        .register(
            "add",
            Arc::new(AddHandler::new(2)),
            RetryPolicy::new(5, Duration::from_millis(200), 2.0),
        )
        .expect("register add")
        .register("multiply", Arc::new(MultiplyHandler), RetryPolicy::none())
        .expect("register multiply")
        .register(
            "persist_result",
            Arc::new(PersistHandler {
                blobs: Arc::clone(&blobs) as Arc<dyn BlobStore>,
            }),
            RetryPolicy::default(),
        )
        .expect("register persist_result")
        .build();

    // (a + b) * 10, then persist the product.
    let chain = WorkflowChain::new(vec![
        TaskSpec::new("add", vec![serde_json::json!(a), serde_json::json!(b)]),
        TaskSpec::new("multiply", vec![serde_json::json!(10)]),
        TaskSpec::new("persist_result", vec![]),
    ])
    .expect("chain is non-empty");

    let receipt = engine.submit_chain(chain).await.expect("submit chain");
    info!(workflow_id = %receipt.workflow_id, task_id = %receipt.terminal, "submitted");

    // Poll the terminal id the way an external caller would.
    loop {
        let view = engine.status(receipt.terminal).await.expect("task exists");
        info!(task_id = %view.task_id, status = ?view.status, "polled");
        if view.status.is_terminal() {
            match view.status {
                TaskStatus::Success => {
                    info!(result = %view.result.unwrap_or_default(), "workflow succeeded")
                }
                _ => error!(error = ?view.error, "workflow failed"),
            }
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    for path in blobs.paths().await {
        if let Some(blob) = blobs.get(&path).await {
            info!(
                path = %path,
                content_type = %blob.content_type,
                body = %String::from_utf8_lossy(&blob.bytes),
                "persisted artifact"
            );
        }
    }

    engine.shutdown().await;
}
