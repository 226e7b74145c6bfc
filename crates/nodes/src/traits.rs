//! The `NodeExecutor` trait — the contract every node type must fulfil.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::NodeError;

/// Everything a node sees while it runs.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency. The
/// variables are a snapshot taken at dispatch time; writes go back through
/// the returned [`NodeOutcome`], never through the context.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// ID of the node within the workflow graph.
    pub node_id: String,
    /// The node's configuration as written in the definition.
    pub config: Value,
    /// Execution variables at dispatch time.
    pub variables: Map<String, Value>,
    /// 1-based attempt number under the node's retry policy.
    pub attempt: u32,
    /// 1-based pass number for nodes inside (or closing) a loop body.
    pub iteration: u32,
    /// Tripped when the execution is cancelled.
    pub cancel: CancellationToken,
}

impl NodeContext {
    /// Variables as a JSON object, the shape expressions evaluate against.
    pub fn variables_value(&self) -> Value {
        Value::Object(self.variables.clone())
    }
}

/// What a node produced.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    /// Merge `variables` into the execution and continue along the
    /// outgoing edges. `output` is kept on the node's execution record.
    Completed {
        output: Value,
        variables: Map<String, Value>,
    },
    /// A boolean decision consumed by outgoing edges (`condition`, `loop`).
    /// Variables are left untouched.
    Branch { result: bool },
    /// Park the branch until `until`; the node completes when it fires.
    Suspend { until: DateTime<Utc> },
}

impl NodeOutcome {
    /// Completed without output or variable changes.
    pub fn empty() -> Self {
        Self::Completed {
            output: Value::Null,
            variables: Map::new(),
        }
    }
}

/// The structural role a node type plays in the graph.
///
/// The validator enforces fan-out / fan-in rules per role, and the
/// scheduler uses it to decide how outgoing edges are activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Ordinary step: at most one outgoing edge.
    Step,
    /// Chooses among conditional outgoing edges.
    Branch,
    /// Activates every outgoing edge.
    Fork,
    /// Barrier over every incoming edge.
    Join,
    /// Owns loop-back edges and re-enters its body.
    Loop,
}

/// The core node trait.
///
/// All built-in node types and plugins must implement this.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Structural role of nodes of this type.
    fn role(&self) -> NodeRole {
        NodeRole::Step
    }

    /// Check a node's configuration when the definition is validated.
    fn validate_config(&self, _config: &Value) -> Result<(), String> {
        Ok(())
    }

    /// Name of the action that undoes this node, if its config declares one.
    fn compensation_action(&self, _config: &Value) -> Option<String> {
        None
    }

    /// Run the node once.
    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutcome, NodeError>;
}
