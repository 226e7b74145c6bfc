//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory and on the wire. A definition serialises as a whole into the
//! `graph_json` column of `workflow_definitions`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Retry behaviour for a node's retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 100,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Back-off before the next attempt, given the 1-based number of the
    /// attempt that just failed: `min(base * 2^(attempt-1), max)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered `NodeExecutor`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Type-specific configuration, checked at validation time.
    #[serde(default)]
    pub config: Value,
    /// Whether this node's effect is undone when the execution compensates.
    #[serde(default)]
    pub compensatable: bool,
    /// Falls back to the engine default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Per-attempt time limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_ms: Option<u64>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config,
            compensatable: false,
            retry: None,
            max_duration_ms: None,
        }
    }

    pub fn compensatable(mut self) -> Self {
        self.compensatable = true;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_max_duration_ms(mut self, ms: u64) -> Self {
        self.max_duration_ms = Some(ms);
        self
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source_node_id: String,
    pub target_node_id: String,
    /// Expression over the execution variables; the edge is taken only
    /// when it holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Marks the edge a `loop` node uses to re-enter its body. Loop-back
    /// edges are excluded from the acyclicity check.
    #[serde(default)]
    pub loop_back: bool,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_node_id: source.into(),
            target_node_id: target.into(),
            condition: None,
            loop_back: false,
        }
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn loop_back(mut self) -> Self {
        self.loop_back = true;
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete, immutable workflow definition.
///
/// Publishing a definition under an existing id stores a new version;
/// executions keep running against the version they started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    /// Assigned by the engine at publish time.
    #[serde(default)]
    pub version: u32,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    pub entry_node_id: String,
    /// Execution-level deadline; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Compensate completed nodes whenever the execution fails.
    #[serde(default)]
    pub compensate_on_failure: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Convenience constructor for tests and embedding.
    pub fn new(
        name: impl Into<String>,
        entry_node_id: impl Into<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 0,
            nodes,
            edges,
            entry_node_id: entry_node_id.into(),
            timeout_ms: None,
            compensate_on_failure: false,
            created_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Compensating,
    Compensated,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Compensated
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "compensating" => Self::Compensating,
            "compensated" => Self::Compensated,
            other => return Err(format!("unknown execution status '{other}'")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Compensated,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Compensated => "compensated",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "skipped" => Self::Skipped,
            "compensated" => Self::Compensated,
            other => return Err(format!("unknown node status '{other}'")),
        })
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecution
// ---------------------------------------------------------------------------

/// One attempt of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeExecutionRecord {
    pub node_id: String,
    pub status: NodeStatus,
    /// 1-based attempt number; 0 for skipped nodes.
    pub attempt: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub output: Option<Value>,
}

/// A compensation action that itself failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationFailure {
    pub node_id: String,
    pub action: String,
    pub error: String,
}

/// One triggered run of a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_version: u32,
    pub trigger_type: TriggerType,
    pub status: ExecutionStatus,
    pub variables: Map<String, Value>,
    pub node_logs: Vec<NodeExecutionRecord>,
    /// Nodes currently ready, running or parked on a timer.
    pub frontier: BTreeSet<String>,
    /// Human-readable cause of a failed, cancelled or compensated run.
    pub error: Option<String>,
    pub compensation_failures: Vec<CompensationFailure>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// A fresh `pending` execution of `definition`.
    ///
    /// An object payload seeds the variables; the whole payload is also
    /// bound under `trigger`.
    pub fn new(definition: &WorkflowDefinition, trigger_type: TriggerType, payload: Value) -> Self {
        let mut variables = match &payload {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        variables.insert("trigger".into(), payload);

        Self {
            id: Uuid::new_v4(),
            workflow_id: definition.id,
            workflow_version: definition.version,
            trigger_type,
            status: ExecutionStatus::Pending,
            variables,
            node_logs: Vec::new(),
            frontier: BTreeSet::new(),
            error: None,
            compensation_failures: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// All records for `node_id`, in log order.
    pub fn records_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a NodeExecutionRecord> + 'a {
        self.node_logs.iter().filter(move |r| r.node_id == node_id)
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    Schedule,
    Event,
    Webhook,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Schedule => "schedule",
            Self::Event => "event",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "manual" => Self::Manual,
            "schedule" => Self::Schedule,
            "event" => Self::Event,
            "webhook" => Self::Webhook,
            other => return Err(format!("unknown trigger type '{other}'")),
        })
    }
}

/// Type-specific trigger settings, serialised as `{ "type": …, "config": … }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum TriggerKind {
    /// Started explicitly through the API.
    Manual,
    /// Started on a cron schedule (5 or 6 fields).
    Schedule { cron: String },
    /// Started whenever the named event is emitted.
    Event { event: String },
    /// Started by `POST /hooks/{trigger_id}`.
    Webhook {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
}

impl TriggerKind {
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Manual => TriggerType::Manual,
            Self::Schedule { .. } => TriggerType::Schedule,
            Self::Event { .. } => TriggerType::Event,
            Self::Webhook { .. } => TriggerType::Webhook,
        }
    }
}

/// A rule that turns an external signal into a [`StartRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: Uuid,
    pub workflow_id: Uuid,
    #[serde(flatten)]
    pub kind: TriggerKind,
    pub created_at: DateTime<Utc>,
}

impl Trigger {
    pub fn new(workflow_id: Uuid, kind: TriggerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            kind,
            created_at: Utc::now(),
        }
    }
}

/// Uniform request to start an execution, whatever the trigger source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub workflow_id: Uuid,
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub payload: Value,
}

impl StartRequest {
    pub fn manual(workflow_id: Uuid, payload: Value) -> Self {
        Self {
            workflow_id,
            trigger_type: TriggerType::Manual,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_survives_a_json_round_trip() {
        let mut def = WorkflowDefinition::new(
            "orders",
            "check",
            vec![
                Node::new("check", "condition", json!({ "expression": "amount > 10" })),
                Node::new("charge", "task", json!({ "action": "charge", "compensate": "refund" }))
                    .compensatable()
                    .with_retry(RetryPolicy::new(3, 50, 1_000)),
                Node::new("skip", "task", json!({ "action": "noop" })).with_max_duration_ms(500),
            ],
            vec![
                Edge::new("e1", "check", "charge").when("result == true"),
                Edge::new("e2", "check", "skip").when("result == false"),
            ],
        );
        def.version = 3;
        def.compensate_on_failure = true;

        let json = serde_json::to_string(&def).unwrap();
        let back: WorkflowDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn wire_format_uses_camel_case_and_type() {
        let node = Node::new("a", "task", json!({}));
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "task");

        let edge: Edge = serde_json::from_value(json!({
            "id": "e", "sourceNodeId": "a", "targetNodeId": "b"
        }))
        .unwrap();
        assert!(!edge.loop_back);
        assert!(edge.condition.is_none());
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 100, 350);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(40), Duration::from_millis(350));
    }

    #[test]
    fn payload_seeds_variables() {
        let def = WorkflowDefinition::new("w", "a", vec![Node::new("a", "task", json!({}))], vec![]);
        let exec = WorkflowExecution::new(&def, TriggerType::Manual, json!({ "amount": 5 }));
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert_eq!(exec.variables["amount"], json!(5));
        assert_eq!(exec.variables["trigger"], json!({ "amount": 5 }));
    }

    #[test]
    fn trigger_serialises_type_and_config() {
        let trigger = Trigger::new(Uuid::new_v4(), TriggerKind::Schedule { cron: "0 * * * *".into() });
        let value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(value["type"], "schedule");
        assert_eq!(value["config"]["cron"], "0 * * * *");

        let back: Trigger = serde_json::from_value(value).unwrap();
        assert_eq!(back, trigger);

        let kind: TriggerKind = serde_json::from_value(json!({ "type": "manual" })).unwrap();
        assert_eq!(kind, TriggerKind::Manual);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Compensating,
            ExecutionStatus::Compensated,
        ] {
            assert_eq!(status.as_str().parse::<ExecutionStatus>(), Ok(status));
        }
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Compensating.is_terminal());
        assert_eq!("skipped".parse::<NodeStatus>(), Ok(NodeStatus::Skipped));
    }
}
