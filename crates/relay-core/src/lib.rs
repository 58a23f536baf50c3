//! relay-core
//!
//! Core building blocks for the Relay workflow engine.
//!
//! # Module layout
//! - **domain**: domain model (ids, names, specs, invocations, records, retry)
//! - **channel**: task channel port + in-memory implementation
//! - **registry**: task name -> handler/policy registry
//! - **store**: result store port + in-memory implementation
//! - **storage**: blob store port for handlers that persist artifacts
//! - **worker**: worker pool and the per-task execution state machine
//! - **chain**: workflow chain executor (step handoff, fail-fast)
//! - **engine**: the facade callers build and talk to
//! - **config**: environment-sourced configuration

pub mod chain;
pub mod channel;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod registry;
pub mod storage;
pub mod store;
pub mod worker;

pub use chain::{ChainExecutor, ChainReceipt};
pub use channel::{Channel, InMemoryChannel};
pub use config::{ConfigError, EngineConfig};
pub use domain::{
    ResultRecord, RetryPolicy, TaskId, TaskInvocation, TaskName, TaskSpec, TaskStatus,
    WorkflowChain, WorkflowId,
};
pub use engine::{Engine, EngineBuilder, StatusView};
pub use error::{EngineError, TaskError};
pub use registry::{FrozenRegistry, TaskHandler, TaskRegistry};
pub use storage::{BlobStore, MemoryBlobStore, StorageError, StoredBlob};
pub use store::{InMemoryResultStore, ResultStore};
pub use worker::WorkerPool;
