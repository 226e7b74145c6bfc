use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::ExecutionAccepted;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EventAccepted {
    pub event: String,
    pub executions: Vec<ExecutionAccepted>,
}

pub async fn emit(
    Path(name): Path<String>,
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> ApiResult<(StatusCode, Json<EventAccepted>)> {
    let payload = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let started = state.engine.emit_event(&name, payload).await?;
    let executions = started.iter().map(ExecutionAccepted::from).collect();
    Ok((StatusCode::ACCEPTED, Json(EventAccepted { event: name, executions })))
}
