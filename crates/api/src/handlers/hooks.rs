use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::ExecutionAccepted;
use crate::error::ApiResult;
use crate::AppState;

/// Inbound webhook; the request body becomes the execution payload.
pub async fn receive(
    Path(trigger_id): Path<Uuid>,
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<ExecutionAccepted>)> {
    let payload = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let execution = state.engine.fire_webhook(trigger_id, payload).await?;
    info!(%trigger_id, execution_id = %execution.id, "webhook accepted");
    Ok((StatusCode::ACCEPTED, Json(ExecutionAccepted::from(&execution))))
}
