//! Saga-style rollback of completed nodes.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use nodes::{ActionProvider, ActionRequest};

use crate::context::ExecutionContext;
use crate::models::CompensationFailure;

/// Runs compensation actions for an execution that entered `compensating`.
///
/// The walk is best-effort: a failing compensation is recorded on the
/// execution and the walk moves on to the next node.
pub struct CompensationCoordinator {
    actions: Arc<dyn ActionProvider>,
}

impl CompensationCoordinator {
    pub fn new(actions: Arc<dyn ActionProvider>) -> Self {
        Self { actions }
    }

    /// Undo every completed compensatable node, most recent first, then
    /// move the execution to `compensated`. Returns the failures recorded.
    #[instrument(skip_all, fields(execution_id = %context.execution_id()))]
    pub async fn run(&self, context: &ExecutionContext) -> Vec<CompensationFailure> {
        let plan = context.compensation_plan();
        let definition = Arc::clone(context.graph().definition());
        info!(steps = plan.len(), "starting compensation");

        let mut failures = Vec::new();
        for step in plan {
            let request = ActionRequest {
                workflow_id: definition.id,
                execution_id: context.execution_id(),
                node_id: step.node_id.clone(),
                input: step.input,
                variables: context.variables(),
            };

            match self.actions.invoke(&step.action, request).await {
                Ok(_) => {
                    info!(node_id = %step.node_id, action = %step.action, "node compensated");
                    context.mark_compensated(step.record);
                }
                Err(err) => {
                    warn!(node_id = %step.node_id, action = %step.action, "compensation failed: {}", err);
                    let failure = CompensationFailure {
                        node_id: step.node_id,
                        action: step.action,
                        error: err.to_string(),
                    };
                    context.record_compensation_failure(failure.clone());
                    failures.push(failure);
                }
            }
        }

        context.finish_compensation();
        failures
    }
}
