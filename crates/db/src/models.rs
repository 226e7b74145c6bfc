//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate, which converts to and from
//! these rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflow_definitions
// ---------------------------------------------------------------------------

/// One published version of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowDefinitionRow {
    pub id: Uuid,
    pub version: i32,
    pub name: String,
    /// Full JSON graph (nodes, edges, entry node, settings).
    pub graph_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// A persisted workflow execution row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub workflow_version: i32,
    pub status: String,
    pub trigger_type: String,
    pub variables_json: serde_json::Value,
    pub error: Option<String>,
    pub compensation_failures: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// node_execution_records
// ---------------------------------------------------------------------------

/// One attempt of one node. `seq` preserves log order within an execution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRecordRow {
    pub execution_id: Uuid,
    pub seq: i32,
    pub node_id: String,
    pub attempt: i32,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub output: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// workflow_triggers
// ---------------------------------------------------------------------------

/// A persisted trigger row. `config` holds the type-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TriggerRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_type: String,
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
