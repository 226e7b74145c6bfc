pub mod events;
pub mod executions;
pub mod hooks;
pub mod triggers;
pub mod workflows;

use serde::Serialize;
use uuid::Uuid;

use engine::{ExecutionStatus, WorkflowExecution};

/// Body returned whenever a request starts or cancels an execution.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAccepted {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
}

impl From<&WorkflowExecution> for ExecutionAccepted {
    fn from(execution: &WorkflowExecution) -> Self {
        Self {
            execution_id: execution.id,
            status: execution.status,
        }
    }
}
