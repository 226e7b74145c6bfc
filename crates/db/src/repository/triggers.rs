//! Trigger CRUD operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::TriggerRow};

/// Insert a new trigger.
pub async fn insert_trigger(pool: &PgPool, row: &TriggerRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_triggers (id, workflow_id, trigger_type, config, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(row.id)
    .bind(row.workflow_id)
    .bind(&row.trigger_type)
    .bind(&row.config)
    .bind(row.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a single trigger by its primary key.
pub async fn get_trigger(pool: &PgPool, id: Uuid) -> Result<Option<TriggerRow>, DbError> {
    let row = sqlx::query_as::<_, TriggerRow>(
        r#"SELECT id, workflow_id, trigger_type, config, created_at FROM workflow_triggers WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return all triggers ordered by creation time (oldest first).
pub async fn list_triggers(pool: &PgPool) -> Result<Vec<TriggerRow>, DbError> {
    let rows = sqlx::query_as::<_, TriggerRow>(
        r#"SELECT id, workflow_id, trigger_type, config, created_at FROM workflow_triggers ORDER BY created_at ASC"#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Permanently delete a trigger by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_trigger(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM workflow_triggers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
