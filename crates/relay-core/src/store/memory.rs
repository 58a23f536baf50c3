//! In-memory result store implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use super::ResultStore;
use crate::domain::{ResultRecord, TaskId};
use crate::error::EngineError;

/// Record plus the parties waiting for it to reach a terminal status.
struct Slot {
    record: ResultRecord,
    waiters: Vec<oneshot::Sender<ResultRecord>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            record: ResultRecord::pending(),
            waiters: Vec::new(),
        }
    }
}

/// In-memory result store.
///
/// Single source of truth for record state; terminal transitions drain the
/// slot's waiters, which is how chain step completion is observed.
pub struct InMemoryResultStore {
    slots: Mutex<HashMap<TaskId, Slot>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Apply `mutate` to the record for `id`, enforcing monotonicity: updates
    /// against an already-terminal record are dropped.
    async fn apply(
        &self,
        id: TaskId,
        mutate: impl FnOnce(&mut ResultRecord),
    ) -> Result<(), EngineError> {
        let mut slots = self.slots.lock().await;
        let slot = slots.get_mut(&id).ok_or(EngineError::NotFound(id))?;

        if slot.record.status.is_terminal() {
            debug!(task_id = %id, status = ?slot.record.status, "dropping update to terminal record");
            return Ok(());
        }

        mutate(&mut slot.record);

        if slot.record.status.is_terminal() {
            let record = slot.record.clone();
            for waiter in slot.waiters.drain(..) {
                let _ = waiter.send(record.clone());
            }
        }
        Ok(())
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn create(&self, id: TaskId) {
        let mut slots = self.slots.lock().await;
        slots.entry(id).or_insert_with(Slot::new);
    }

    async fn get(&self, id: TaskId) -> Result<ResultRecord, EngineError> {
        let slots = self.slots.lock().await;
        slots
            .get(&id)
            .map(|slot| slot.record.clone())
            .ok_or(EngineError::NotFound(id))
    }

    async fn mark_started(&self, id: TaskId) -> Result<(), EngineError> {
        self.apply(id, |record| record.mark_started()).await
    }

    async fn mark_retry(&self, id: TaskId, error: String) -> Result<(), EngineError> {
        self.apply(id, |record| record.mark_retry(error)).await
    }

    async fn mark_success(
        &self,
        id: TaskId,
        result: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.apply(id, |record| record.mark_success(result)).await
    }

    async fn mark_failure(&self, id: TaskId, error: String) -> Result<(), EngineError> {
        self.apply(id, |record| record.mark_failure(error)).await
    }

    async fn wait_terminal(&self, id: TaskId) -> Result<ResultRecord, EngineError> {
        let rx = {
            let mut slots = self.slots.lock().await;
            let slot = slots.get_mut(&id).ok_or(EngineError::NotFound(id))?;

            if slot.record.status.is_terminal() {
                return Ok(slot.record.clone());
            }

            let (tx, rx) = oneshot::channel();
            slot.waiters.push(tx);
            rx
        };

        // Sender side only drops if the store itself is torn down mid-wait.
        rx.await.map_err(|_| EngineError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn create_then_get_is_pending() {
        let store = InMemoryResultStore::new();
        let id = TaskId::generate();

        store.create(id).await;

        let record = store.get(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.attempts, 0);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryResultStore::new();

        let err = store.get(TaskId::generate()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn terminal_record_is_never_regressed() {
        let store = InMemoryResultStore::new();
        let id = TaskId::generate();
        store.create(id).await;

        store.mark_started(id).await.unwrap();
        store.mark_success(id, json!(50)).await.unwrap();

        // A redelivered invocation would try these again; all must be dropped.
        store.mark_started(id).await.unwrap();
        store.mark_retry(id, "late".to_string()).await.unwrap();
        store.mark_failure(id, "late".to_string()).await.unwrap();

        let record = store.get(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(record.result, Some(json!(50)));
        assert_eq!(record.attempts, 1);
    }

    #[tokio::test]
    async fn wait_terminal_resolves_on_later_completion() {
        let store = Arc::new(InMemoryResultStore::new());
        let id = TaskId::generate();
        store.create(id).await;

        let waiter = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.wait_terminal(id).await }
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.mark_started(id).await.unwrap();
        store.mark_success(id, json!(5)).await.unwrap();

        let record = tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(record.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn wait_terminal_resolves_immediately_when_already_terminal() {
        let store = InMemoryResultStore::new();
        let id = TaskId::generate();
        store.create(id).await;
        store.mark_started(id).await.unwrap();
        store.mark_failure(id, "boom".to_string()).await.unwrap();

        let record = store.wait_terminal(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Failure);
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = InMemoryResultStore::new();
        let id = TaskId::generate();

        store.create(id).await;
        store.mark_started(id).await.unwrap();
        store.create(id).await; // must not reset the record

        let record = store.get(id).await.unwrap();
        assert_eq!(record.status, TaskStatus::Started);
        assert_eq!(record.attempts, 1);
    }
}
