//! Input specs: a task descriptor and an ordered chain of them.

use serde::{Deserialize, Serialize};

use super::name::TaskName;
use super::retry::RetryPolicy;
use crate::error::EngineError;

/// Immutable descriptor of one unit of work.
///
/// Arguments are opaque JSON values; the handler decodes what it needs.
/// `retry` overrides the registry's default policy for this spec only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: TaskName,

    /// Declared positional arguments.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,

    /// Optional per-spec retry override (registry default applies otherwise).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl TaskSpec {
    pub fn new(name: impl Into<TaskName>, args: Vec<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            args,
            retry: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

/// An ordered, non-empty sequence of task specs executed as one workflow.
///
/// Result threading convention: each step after the first receives the prior
/// step's result *prepended* to its declared arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowChain {
    steps: Vec<TaskSpec>,
}

impl WorkflowChain {
    /// Build a chain. Fails with `EmptyChain` for an empty step list.
    pub fn new(steps: Vec<TaskSpec>) -> Result<Self, EngineError> {
        if steps.is_empty() {
            return Err(EngineError::EmptyChain);
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[TaskSpec] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_chain_is_rejected() {
        let err = WorkflowChain::new(vec![]).unwrap_err();
        assert!(matches!(err, EngineError::EmptyChain));
    }

    #[test]
    fn task_spec_roundtrip_json() {
        let spec = TaskSpec::new("add", vec![json!(2), json!(3)]);

        let s = serde_json::to_string(&spec).expect("serialize");
        let de: TaskSpec = serde_json::from_str(&s).expect("deserialize");
        assert_eq!(de.name.as_str(), "add");
        assert_eq!(de.args, vec![json!(2), json!(3)]);
        assert!(de.retry.is_none());
    }

    #[test]
    fn spec_without_args_gets_empty_args() {
        let json = r#"{ "name": "noop" }"#;
        let spec: TaskSpec = serde_json::from_str(json).expect("deserialize");
        assert!(spec.args.is_empty());
    }

    #[test]
    fn chain_preserves_step_order() {
        let chain = WorkflowChain::new(vec![
            TaskSpec::new("add", vec![json!(1), json!(2)]),
            TaskSpec::new("multiply", vec![json!(10)]),
        ])
        .unwrap();

        assert_eq!(chain.len(), 2);
        assert!(!chain.is_empty());
        assert_eq!(chain.steps()[0].name.as_str(), "add");
        assert_eq!(chain.steps()[1].name.as_str(), "multiply");
    }
}
