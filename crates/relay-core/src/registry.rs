//! Task registry: name -> (handler, retry policy).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{RetryPolicy, TaskName};
use crate::error::{EngineError, TaskError};

/// A handler for a registered task name.
///
/// Receives the invocation's materialized arguments as opaque JSON values and
/// decodes what it needs. Return `TaskError::Transient` for failures worth
/// retrying; `TaskError::Permanent` goes straight to a terminal FAILURE.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, TaskError>;
}

/// Registration entry: handler plus its default retry policy.
#[derive(Clone)]
struct Registration {
    handler: Arc<dyn TaskHandler>,
    retry: RetryPolicy,
}

/// Mutable registry, populated once at process start.
///
/// Design: built during initialization (mutable), then frozen for runtime
/// (immutable). Workers read the frozen form concurrently without locking.
#[derive(Default)]
pub struct TaskRegistry {
    entries: HashMap<TaskName, Registration>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler with its default retry policy.
    /// Registering the same name twice is an error.
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        handler: Arc<dyn TaskHandler>,
        retry: RetryPolicy,
    ) -> Result<(), EngineError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(EngineError::DuplicateTask(name));
        }
        self.entries.insert(name, Registration { handler, retry });
        Ok(())
    }

    /// One-time freeze: no further registration is possible afterwards.
    pub fn freeze(self) -> FrozenRegistry {
        FrozenRegistry {
            entries: Arc::new(self.entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable registry shared by all workers. Cheap to clone.
#[derive(Clone)]
pub struct FrozenRegistry {
    entries: Arc<HashMap<TaskName, Registration>>,
}

impl FrozenRegistry {
    /// Resolve a task name to its handler and default retry policy.
    pub fn resolve(
        &self,
        name: &TaskName,
    ) -> Result<(Arc<dyn TaskHandler>, RetryPolicy), EngineError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| EngineError::UnknownTask(name.clone()))?;
        Ok((Arc::clone(&entry.handler), entry.retry.clone()))
    }

    pub fn contains(&self, name: &TaskName) -> bool {
        self.entries.contains_key(name)
    }
}
