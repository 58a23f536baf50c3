//! Domain model (ids, specs, invocations, records, retry policy).

pub mod ids;
pub mod invocation;
pub mod name;
pub mod record;
pub mod retry;
pub mod spec;

pub use ids::{TaskId, WorkflowId};
pub use invocation::TaskInvocation;
pub use name::TaskName;
pub use record::{ResultRecord, TaskStatus};
pub use retry::RetryPolicy;
pub use spec::{TaskSpec, WorkflowChain};
