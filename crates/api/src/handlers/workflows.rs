use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use engine::{StartRequest, TriggerType, WorkflowDefinition};

use super::ExecutionAccepted;
use crate::error::ApiResult;
use crate::AppState;

pub async fn publish(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> ApiResult<(StatusCode, Json<WorkflowDefinition>)> {
    let published = state.engine.publish(definition).await?;
    Ok((StatusCode::CREATED, Json(published)))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<WorkflowDefinition>> {
    Ok(Json(state.engine.definition(id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExecutionDto {
    #[serde(default)]
    pub trigger_type: Option<TriggerType>,
    #[serde(default)]
    pub payload: Value,
}

pub async fn start(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    body: Option<Json<StartExecutionDto>>,
) -> ApiResult<(StatusCode, Json<ExecutionAccepted>)> {
    let dto = body.map(|Json(dto)| dto).unwrap_or_default();
    let request = StartRequest {
        workflow_id: id,
        trigger_type: dto.trigger_type.unwrap_or(TriggerType::Manual),
        payload: dto.payload,
    };
    let execution = state.engine.start(request).await?;
    Ok((StatusCode::ACCEPTED, Json(ExecutionAccepted::from(&execution))))
}
