//! Postgres-backed store over the `db` crate's repository functions.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use db::models::{NodeExecutionRecordRow, TriggerRow, WorkflowDefinitionRow, WorkflowExecutionRow};
use db::repository::{definitions, executions, triggers};
use db::{DbError, DbPool};

use super::DefinitionStore;
use crate::error::StoreError;
use crate::models::{NodeExecutionRecord, Trigger, TriggerKind, WorkflowDefinition, WorkflowExecution};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const EXECUTIONS: &str = "workflow_executions";
const NODE_RECORDS: &str = "node_execution_records";

fn to_i32(value: u32, table: &'static str, column: &'static str) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|_| DbError::invalid_column(table, column, format!("{value} does not fit")))
}

fn to_u32(value: i32, table: &'static str, column: &'static str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::invalid_column(table, column, format!("negative value {value}")))
}

fn execution_to_rows(
    execution: &WorkflowExecution,
) -> Result<(WorkflowExecutionRow, Vec<NodeExecutionRecordRow>), StoreError> {
    let row = WorkflowExecutionRow {
        id: execution.id,
        workflow_id: execution.workflow_id,
        workflow_version: to_i32(execution.workflow_version, EXECUTIONS, "workflow_version")?,
        status: execution.status.as_str().to_owned(),
        trigger_type: execution.trigger_type.as_str().to_owned(),
        variables_json: serde_json::Value::Object(execution.variables.clone()),
        error: execution.error.clone(),
        compensation_failures: serde_json::to_value(&execution.compensation_failures)?,
        created_at: execution.created_at,
        started_at: execution.started_at,
        completed_at: execution.completed_at,
    };

    let records = execution
        .node_logs
        .iter()
        .enumerate()
        .map(|(seq, record)| {
            Ok(NodeExecutionRecordRow {
                execution_id: execution.id,
                seq: i32::try_from(seq)
                    .map_err(|_| DbError::invalid_column(NODE_RECORDS, "seq", "node log too long"))?,
                node_id: record.node_id.clone(),
                attempt: to_i32(record.attempt, NODE_RECORDS, "attempt")?,
                status: record.status.as_str().to_owned(),
                started_at: record.started_at,
                completed_at: record.completed_at,
                error: record.error.clone(),
                output: record.output.clone(),
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok((row, records))
}

fn execution_from_rows(
    row: WorkflowExecutionRow,
    records: Vec<NodeExecutionRecordRow>,
) -> Result<WorkflowExecution, StoreError> {
    let variables = match row.variables_json {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(DbError::invalid_column(
                EXECUTIONS,
                "variables_json",
                format!("not an object: {other}"),
            )
            .into())
        }
    };

    let node_logs = records
        .into_iter()
        .map(|r| {
            Ok(NodeExecutionRecord {
                status: r
                    .status
                    .parse()
                    .map_err(|msg| DbError::invalid_column(NODE_RECORDS, "status", msg))?,
                attempt: to_u32(r.attempt, NODE_RECORDS, "attempt")?,
                node_id: r.node_id,
                started_at: r.started_at,
                completed_at: r.completed_at,
                error: r.error,
                output: r.output,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(WorkflowExecution {
        id: row.id,
        workflow_id: row.workflow_id,
        workflow_version: to_u32(row.workflow_version, EXECUTIONS, "workflow_version")?,
        trigger_type: row
            .trigger_type
            .parse()
            .map_err(|msg| DbError::invalid_column(EXECUTIONS, "trigger_type", msg))?,
        status: row
            .status
            .parse()
            .map_err(|msg| DbError::invalid_column(EXECUTIONS, "status", msg))?,
        variables,
        node_logs,
        // Only live executions have a frontier.
        frontier: BTreeSet::new(),
        error: row.error,
        compensation_failures: serde_json::from_value(row.compensation_failures)?,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
    })
}

fn trigger_from_row(row: TriggerRow) -> Result<Trigger, StoreError> {
    let kind: TriggerKind = serde_json::from_value(row.config)?;
    if kind.trigger_type().as_str() != row.trigger_type {
        return Err(DbError::invalid_column(
            "triggers",
            "trigger_type",
            format!(
                "trigger {} is stored as '{}' but its config says '{}'",
                row.id,
                row.trigger_type,
                kind.trigger_type()
            ),
        )
        .into());
    }
    Ok(Trigger {
        id: row.id,
        workflow_id: row.workflow_id,
        kind,
        created_at: row.created_at,
    })
}

#[async_trait]
impl DefinitionStore for PgStore {
    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let row = WorkflowDefinitionRow {
            id: definition.id,
            version: to_i32(definition.version, "workflow_definitions", "version")?,
            name: definition.name.clone(),
            graph_json: serde_json::to_value(definition)?,
            created_at: definition.created_at,
        };
        definitions::insert_definition(&self.pool, &row).await?;
        Ok(())
    }

    async fn get_definition(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError> {
        match definitions::get_latest_definition(&self.pool, id).await? {
            Some(row) => Ok(Some(serde_json::from_value(row.graph_json)?)),
            None => Ok(None),
        }
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let (row, records) = execution_to_rows(execution)?;
        executions::save_execution(&self.pool, &row, &records).await?;
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError> {
        let Some(row) = executions::get_execution(&self.pool, id).await? else {
            return Ok(None);
        };
        let records = executions::list_node_records(&self.pool, id).await?;
        execution_from_rows(row, records).map(Some)
    }

    async fn save_trigger(&self, trigger: &Trigger) -> Result<(), StoreError> {
        let row = TriggerRow {
            id: trigger.id,
            workflow_id: trigger.workflow_id,
            trigger_type: trigger.kind.trigger_type().as_str().to_owned(),
            config: serde_json::to_value(&trigger.kind)?,
            created_at: trigger.created_at,
        };
        triggers::insert_trigger(&self.pool, &row).await?;
        Ok(())
    }

    async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>, StoreError> {
        triggers::get_trigger(&self.pool, id)
            .await?
            .map(trigger_from_row)
            .transpose()
    }

    async fn list_triggers(&self) -> Result<Vec<Trigger>, StoreError> {
        triggers::list_triggers(&self.pool)
            .await?
            .into_iter()
            .map(trigger_from_row)
            .collect()
    }

    async fn delete_trigger(&self, id: Uuid) -> Result<bool, StoreError> {
        match triggers::delete_trigger(&self.pool, id).await {
            Ok(()) => Ok(true),
            Err(DbError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CompensationFailure, ExecutionStatus, Node, NodeStatus, TriggerType,
    };
    use serde_json::json;

    #[test]
    fn execution_rows_round_trip() {
        let def = WorkflowDefinition::new("w", "a", vec![Node::new("a", "task", json!({}))], vec![]);
        let mut execution = WorkflowExecution::new(&def, TriggerType::Webhook, json!({ "x": 1 }));
        execution.status = ExecutionStatus::Compensated;
        execution.node_logs.push(NodeExecutionRecord {
            node_id: "a".into(),
            status: NodeStatus::Compensated,
            attempt: 2,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            error: None,
            output: Some(json!({ "id": 7 })),
        });
        execution.compensation_failures.push(CompensationFailure {
            node_id: "b".into(),
            action: "undo".into(),
            error: "boom".into(),
        });

        let (row, records) = execution_to_rows(&execution).unwrap();
        assert_eq!(row.status, "compensated");
        assert_eq!(records[0].seq, 0);

        let back = execution_from_rows(row, records).unwrap();
        assert_eq!(back, execution);
    }

    #[test]
    fn undecodable_status_names_its_column() {
        let def = WorkflowDefinition::new("w", "a", vec![Node::new("a", "task", json!({}))], vec![]);
        let execution = WorkflowExecution::new(&def, TriggerType::Manual, json!({}));
        let (mut row, records) = execution_to_rows(&execution).unwrap();
        row.status = "exploded".into();
        assert!(matches!(
            execution_from_rows(row, records),
            Err(StoreError::Database(DbError::InvalidColumn { column: "status", .. }))
        ));
    }

    #[test]
    fn trigger_row_must_match_its_config() {
        let row = TriggerRow {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            trigger_type: "webhook".into(),
            config: json!({ "type": "event", "config": { "event": "order.created" } }),
            created_at: Utc::now(),
        };
        assert!(matches!(
            trigger_from_row(row),
            Err(StoreError::Database(DbError::InvalidColumn { table: "triggers", .. }))
        ));
    }
}
