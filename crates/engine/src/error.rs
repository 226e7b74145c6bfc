//! Engine-level error types.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use nodes::NodeError;

use crate::models::ExecutionStatus;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// One structural problem in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    #[error("duplicate node id '{node_id}'")]
    DuplicateNodeId { node_id: String },

    #[error("duplicate edge id '{edge_id}'")]
    DuplicateEdgeId { edge_id: String },

    #[error("entry node '{node_id}' does not exist")]
    MissingEntryNode { node_id: String },

    #[error("edge '{edge_id}' references unknown node '{node_id}'")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("node '{node_id}' has unknown type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },

    #[error("node '{node_id}' has invalid config: {message}")]
    InvalidConfig { node_id: String, message: String },

    #[error("node '{node_id}' is compensatable but declares no compensation action")]
    MissingCompensation { node_id: String },

    #[error("node '{node_id}' is unreachable from the entry node")]
    Unreachable { node_id: String },

    #[error("node '{node_id}' has no incoming edge")]
    MissingIncomingEdge { node_id: String },

    #[error("join node '{node_id}' has no incoming edges")]
    JoinWithoutIncoming { node_id: String },

    #[error("cycle among non-loop edges through nodes {nodes:?}")]
    Cycle { nodes: Vec<String> },

    #[error("node '{node_id}' fans out to {count} edges but is not a fork or condition")]
    ImplicitFanOut { node_id: String, count: usize },

    #[error("fork edge '{edge_id}' must not carry a condition")]
    ConditionalForkEdge { edge_id: String },

    #[error("edge '{edge_id}' leaves a condition node without a condition")]
    UnconditionalBranchEdge { edge_id: String },

    #[error("edges {edge_ids:?} leaving '{node_id}' share the condition '{condition}'")]
    AmbiguousBranch {
        node_id: String,
        condition: String,
        edge_ids: Vec<String>,
    },

    #[error("loop node '{node_id}' must have exactly one loop-back edge, found {count}")]
    LoopBackCount { node_id: String, count: usize },

    #[error("loop-back edge '{edge_id}' is invalid: {reason}")]
    InvalidLoopBack { edge_id: String, reason: String },
}

/// Every violation found in a definition, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("workflow definition is invalid: {}", summary(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn contains(&self, predicate: impl Fn(&Violation) -> bool) -> bool {
        self.violations.iter().any(predicate)
    }
}

// ---------------------------------------------------------------------------
// Execution failures
// ---------------------------------------------------------------------------

/// Why a run ended unsuccessfully. Rendered into `WorkflowExecution::error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    #[error("node '{node_id}' failed after {attempts} attempt(s): {error}")]
    NodeFailed {
        node_id: String,
        attempts: u32,
        error: NodeError,
    },

    #[error("execution exceeded its deadline of {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("execution stalled with nodes {waiting:?} never becoming ready (deadlock timeout after {after_ms} ms)")]
    DeadlockTimeout { after_ms: u64, waiting: Vec<String> },

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution scheduler crashed: {0}")]
    SchedulerPanicked(String),
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("invalid cron expression '{cron}': {message}")]
    InvalidCron { cron: String, message: String },

    #[error("event name must not be empty")]
    EmptyEventName,

    #[error("webhook path must start with '/': '{0}'")]
    InvalidWebhookPath(String),

    #[error("trigger {trigger_id} is a {actual} trigger, expected {expected}")]
    WrongType {
        trigger_id: Uuid,
        expected: &'static str,
        actual: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Errors returned by the [`WorkflowEngine`](crate::WorkflowEngine) API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    #[error("trigger {0} not found")]
    TriggerNotFound(Uuid),

    #[error("execution {execution_id} is already {status}")]
    AlreadyTerminal {
        execution_id: Uuid,
        status: ExecutionStatus,
    },

    #[error("execution {execution_id} is {status} and can no longer be cancelled")]
    NotCancellable {
        execution_id: Uuid,
        status: ExecutionStatus,
    },

    #[error("invalid trigger: {0}")]
    Trigger(#[from] TriggerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("engine is shutting down")]
    ShuttingDown,
}
