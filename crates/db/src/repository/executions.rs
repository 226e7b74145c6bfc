//! Execution and node-execution-record repository functions.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{NodeExecutionRecordRow, WorkflowExecutionRow},
};

/// Upsert an execution together with its full node log.
///
/// The node log is append-only in the engine, but a record's status can
/// still change (running → completed/failed/compensated), so the whole log
/// is rewritten inside one transaction.
pub async fn save_execution(
    pool: &PgPool,
    execution: &WorkflowExecutionRow,
    records: &[NodeExecutionRecordRow],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO workflow_executions
            (id, workflow_id, workflow_version, status, trigger_type, variables_json,
             error, compensation_failures, created_at, started_at, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            variables_json = EXCLUDED.variables_json,
            error = EXCLUDED.error,
            compensation_failures = EXCLUDED.compensation_failures,
            started_at = EXCLUDED.started_at,
            completed_at = EXCLUDED.completed_at
        "#,
    )
    .bind(execution.id)
    .bind(execution.workflow_id)
    .bind(execution.workflow_version)
    .bind(&execution.status)
    .bind(&execution.trigger_type)
    .bind(&execution.variables_json)
    .bind(&execution.error)
    .bind(&execution.compensation_failures)
    .bind(execution.created_at)
    .bind(execution.started_at)
    .bind(execution.completed_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM node_execution_records WHERE execution_id = $1")
        .bind(execution.id)
        .execute(&mut *tx)
        .await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO node_execution_records
                (execution_id, seq, node_id, attempt, status, started_at, completed_at, error, output)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.execution_id)
        .bind(record.seq)
        .bind(&record.node_id)
        .bind(record.attempt)
        .bind(&record.status)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(&record.error)
        .bind(&record.output)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Fetch a single execution by its primary key.
pub async fn get_execution(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<WorkflowExecutionRow>, DbError> {
    let row = sqlx::query_as::<_, WorkflowExecutionRow>(
        r#"
        SELECT id, workflow_id, workflow_version, status, trigger_type, variables_json,
               error, compensation_failures, created_at, started_at, completed_at
        FROM workflow_executions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Node log of an execution, in log order.
pub async fn list_node_records(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<NodeExecutionRecordRow>, DbError> {
    let rows = sqlx::query_as::<_, NodeExecutionRecordRow>(
        r#"
        SELECT execution_id, seq, node_id, attempt, status, started_at, completed_at, error, output
        FROM node_execution_records
        WHERE execution_id = $1
        ORDER BY seq ASC
        "#,
    )
    .bind(execution_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
