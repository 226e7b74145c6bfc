use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use engine::WorkflowExecution;

use super::ExecutionAccepted;
use crate::error::ApiResult;
use crate::AppState;

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<WorkflowExecution>> {
    Ok(Json(state.engine.execution(id).await?))
}

pub async fn cancel(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<ExecutionAccepted>> {
    let execution = state.engine.cancel(id).await?;
    Ok(Json(ExecutionAccepted::from(&execution)))
}
