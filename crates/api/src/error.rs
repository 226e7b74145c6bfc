//! Engine errors mapped onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Engine(err) = self;
        let message = err.to_string();

        let (status, body) = match &err {
            EngineError::Validation(validation) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "violations": validation.violations }),
            ),
            EngineError::WorkflowNotFound(_)
            | EngineError::ExecutionNotFound(_)
            | EngineError::TriggerNotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            EngineError::AlreadyTerminal { status, .. } | EngineError::NotCancellable { status, .. } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "status": status }),
            ),
            EngineError::Trigger(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            EngineError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message })),
            EngineError::Store(_) => {
                error!("store failure while handling request: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "internal storage error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
