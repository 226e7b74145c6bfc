//! Workflow definition persistence.
//!
//! Definitions are never updated in place: publishing a new version
//! inserts a new row, and readers take the highest version.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowDefinitionRow};

/// Insert one definition version.
pub async fn insert_definition(pool: &PgPool, row: &WorkflowDefinitionRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_definitions (id, version, name, graph_json, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(row.id)
    .bind(row.version)
    .bind(&row.name)
    .bind(&row.graph_json)
    .bind(row.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the latest version of a definition.
pub async fn get_latest_definition(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<WorkflowDefinitionRow>, DbError> {
    let row = sqlx::query_as::<_, WorkflowDefinitionRow>(
        r#"
        SELECT id, version, name, graph_json, created_at
        FROM workflow_definitions
        WHERE id = $1
        ORDER BY version DESC
        LIMIT 1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetch one specific version of a definition.
pub async fn get_definition_version(
    pool: &PgPool,
    id: Uuid,
    version: i32,
) -> Result<WorkflowDefinitionRow, DbError> {
    sqlx::query_as::<_, WorkflowDefinitionRow>(
        r#"
        SELECT id, version, name, graph_json, created_at
        FROM workflow_definitions
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(id)
    .bind(version)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
