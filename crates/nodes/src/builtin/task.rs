use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::parse_config;
use crate::{ActionProvider, ActionRequest, NodeContext, NodeError, NodeExecutor, NodeOutcome};

/// Config of a `task` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    /// Action to invoke.
    pub action: String,
    /// Static input passed to the action.
    #[serde(default)]
    pub input: Value,
    /// Variable the action's result is stored under; defaults to the node id.
    #[serde(default)]
    pub output_key: Option<String>,
    /// Action that undoes this task during compensation.
    #[serde(default)]
    pub compensate: Option<String>,
}

/// Invokes a named action and stores its result in the execution variables.
pub struct TaskNode {
    actions: Arc<dyn ActionProvider>,
}

impl TaskNode {
    pub fn new(actions: Arc<dyn ActionProvider>) -> Self {
        Self { actions }
    }
}

#[async_trait]
impl NodeExecutor for TaskNode {
    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let config: TaskConfig = parse_config(config)?;
        if !self.actions.has_action(&config.action) {
            return Err(format!("unknown action '{}'", config.action));
        }
        if let Some(compensate) = &config.compensate {
            if !self.actions.has_action(compensate) {
                return Err(format!("unknown compensation action '{compensate}'"));
            }
        }
        Ok(())
    }

    fn compensation_action(&self, config: &Value) -> Option<String> {
        parse_config::<TaskConfig>(config).ok()?.compensate
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutcome, NodeError> {
        let config: TaskConfig = parse_config(&ctx.config).map_err(NodeError::InvalidConfig)?;
        let request = ActionRequest {
            workflow_id: ctx.workflow_id,
            execution_id: ctx.execution_id,
            node_id: ctx.node_id.clone(),
            input: config.input.clone(),
            variables: ctx.variables.clone(),
        };

        debug!(node_id = %ctx.node_id, action = %config.action, attempt = ctx.attempt, "running task");

        let output = tokio::select! {
            result = self.actions.invoke(&config.action, request) => result?,
            _ = ctx.cancel.cancelled() => return Err(NodeError::Cancelled),
        };

        let key = config.output_key.unwrap_or_else(|| ctx.node_id.clone());
        let mut variables = Map::new();
        variables.insert(key, output.clone());
        Ok(NodeOutcome::Completed { output, variables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::ctx;
    use crate::mock::MockAction;
    use crate::ActionRegistry;
    use serde_json::json;

    fn node_with(name: &str, action: MockAction) -> TaskNode {
        let mut actions = ActionRegistry::new();
        actions.register(name, Arc::new(action));
        TaskNode::new(Arc::new(actions))
    }

    #[tokio::test]
    async fn stores_output_under_node_id_by_default() {
        let node = node_with("charge", MockAction::returning(json!({ "receipt": 42 })));
        let outcome = node
            .execute(&ctx("pay", json!({ "action": "charge" }), json!({})))
            .await
            .unwrap();

        match outcome {
            NodeOutcome::Completed { output, variables } => {
                assert_eq!(output, json!({ "receipt": 42 }));
                assert_eq!(variables["pay"], json!({ "receipt": 42 }));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn honours_output_key() {
        let node = node_with("charge", MockAction::returning(json!(1)));
        let outcome = node
            .execute(&ctx(
                "pay",
                json!({ "action": "charge", "outputKey": "payment" }),
                json!({}),
            ))
            .await
            .unwrap();
        assert!(matches!(outcome, NodeOutcome::Completed { variables, .. } if variables.contains_key("payment")));
    }

    #[tokio::test]
    async fn passes_input_and_variables_to_action() {
        let action = MockAction::returning(json!(null));
        let calls = action.calls();
        let node = node_with("charge", action);
        node.execute(&ctx(
            "pay",
            json!({ "action": "charge", "input": { "cents": 500 } }),
            json!({ "customer": "c-1" }),
        ))
        .await
        .unwrap();

        let seen = calls.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].input, json!({ "cents": 500 }));
        assert_eq!(seen[0].variables["customer"], json!("c-1"));
    }

    #[test]
    fn validation_checks_actions_exist() {
        let node = node_with("charge", MockAction::returning(json!(null)));
        assert!(node.validate_config(&json!({ "action": "charge" })).is_ok());
        assert!(node.validate_config(&json!({ "action": "missing" })).is_err());
        assert!(node
            .validate_config(&json!({ "action": "charge", "compensate": "refund" }))
            .is_err());
        assert!(node.validate_config(&json!({})).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_slow_action() {
        let node = node_with(
            "slow",
            MockAction::sleeping(std::time::Duration::from_secs(60), json!(null)),
        );
        let context = ctx("n", json!({ "action": "slow" }), json!({}));
        let token = context.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            token.cancel();
        });
        assert_eq!(node.execute(&context).await, Err(NodeError::Cancelled));
    }
}
