//! `engine` crate — workflow models, graph validation, and the execution engine.

pub mod compensation;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod models;
pub mod store;
pub mod trigger;
pub mod validator;

mod scheduler;

pub use compensation::CompensationCoordinator;
pub use config::{ConfigError, EngineConfig, ServerConfig};
pub use context::ExecutionContext;
pub use engine::WorkflowEngine;
pub use error::{
    EngineError, ExecutionFailure, StoreError, TriggerError, ValidationError, Violation,
};
pub use models::{
    CompensationFailure, Edge, ExecutionStatus, Node, NodeExecutionRecord, NodeStatus, RetryPolicy,
    StartRequest, Trigger, TriggerKind, TriggerType, WorkflowDefinition, WorkflowExecution,
};
pub use store::{DefinitionStore, InMemoryStore, PgStore};
pub use validator::{GraphValidator, ValidatedGraph};
