//! Runtime instance of a task spec.

use serde::{Deserialize, Serialize};

use super::ids::{TaskId, WorkflowId};
use super::spec::TaskSpec;

/// One dispatchable instance of a `TaskSpec`.
///
/// `args` are the materialized arguments: for a chain step after the first,
/// the prior step's result has already been prepended to the spec's declared
/// args. `attempt` counts completed executions; the worker increments it when
/// it starts an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInvocation {
    pub task_id: TaskId,
    pub spec: TaskSpec,
    pub args: Vec<serde_json::Value>,
    pub attempt: u32,

    /// Parent chain, or `None` for a standalone dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowId>,
}

impl TaskInvocation {
    /// A fresh invocation with the spec's declared args as-is.
    pub fn new(task_id: TaskId, spec: TaskSpec) -> Self {
        let args = spec.args.clone();
        Self {
            task_id,
            spec,
            args,
            attempt: 0,
            workflow: None,
        }
    }

    /// A chain-step invocation with `carried` (the prior step's result)
    /// prepended to the declared args.
    pub fn chained(
        task_id: TaskId,
        spec: TaskSpec,
        workflow: WorkflowId,
        carried: Option<serde_json::Value>,
    ) -> Self {
        let mut args = Vec::with_capacity(spec.args.len() + 1);
        if let Some(value) = carried {
            args.push(value);
        }
        args.extend(spec.args.iter().cloned());
        Self {
            task_id,
            spec,
            args,
            attempt: 0,
            workflow: Some(workflow),
        }
    }

    /// Copy for re-enqueue after a transient failure on attempt `attempt`.
    pub fn for_retry(&self, attempt: u32) -> Self {
        let mut next = self.clone();
        next.attempt = attempt;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chained_invocation_prepends_carried_result() {
        let spec = TaskSpec::new("multiply", vec![json!(10)]);
        let inv = TaskInvocation::chained(
            TaskId::generate(),
            spec,
            WorkflowId::generate(),
            Some(json!(5)),
        );

        assert_eq!(inv.args, vec![json!(5), json!(10)]);
    }

    #[test]
    fn first_chain_step_has_no_carried_result() {
        let spec = TaskSpec::new("add", vec![json!(2), json!(3)]);
        let inv =
            TaskInvocation::chained(TaskId::generate(), spec, WorkflowId::generate(), None);

        assert_eq!(inv.args, vec![json!(2), json!(3)]);
        assert!(inv.workflow.is_some());
    }

    #[test]
    fn retry_copy_carries_the_attempt_count() {
        let spec = TaskSpec::new("add", vec![json!(1), json!(1)]);
        let inv = TaskInvocation::new(TaskId::generate(), spec);
        assert_eq!(inv.attempt, 0);

        let retried = inv.for_retry(2);
        assert_eq!(retried.attempt, 2);
        assert_eq!(retried.task_id, inv.task_id);
    }
}
