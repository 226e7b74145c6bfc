use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use engine::{Trigger, TriggerKind};

use crate::error::ApiResult;
use crate::AppState;

/// `{ "type": "schedule", "config": { "cron": "0 * * * *" } }`
pub async fn register(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(kind): Json<TriggerKind>,
) -> ApiResult<(StatusCode, Json<Trigger>)> {
    let trigger = state.engine.register_trigger(workflow_id, kind).await?;
    Ok((StatusCode::CREATED, Json(trigger)))
}

pub async fn list(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Trigger>>> {
    state.engine.definition(workflow_id).await?;
    Ok(Json(state.engine.list_triggers(Some(workflow_id)).await?))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<StatusCode> {
    state.engine.delete_trigger(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
