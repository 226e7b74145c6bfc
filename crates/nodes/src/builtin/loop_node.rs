use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_config;
use crate::{ExpressionEvaluator, NodeContext, NodeError, NodeExecutor, NodeOutcome, NodeRole};

/// Config of a `loop` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    /// Maximum number of passes through the loop body.
    pub max_iterations: u32,
    /// Continuation expression; the body is re-entered while it holds.
    /// Without one the loop continues until the bound, which is an error.
    #[serde(default)]
    pub condition: Option<String>,
}

/// Closes a loop body. `result: true` re-enters the body through the
/// loop-back edges, `false` leaves through the ordinary edges.
#[derive(Debug, Default)]
pub struct LoopNode {
    evaluator: ExpressionEvaluator,
}

#[async_trait]
impl NodeExecutor for LoopNode {
    fn role(&self) -> NodeRole {
        NodeRole::Loop
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let config: LoopConfig = parse_config(config)?;
        if config.max_iterations == 0 {
            return Err("maxIterations must be at least 1".into());
        }
        Ok(())
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutcome, NodeError> {
        let config: LoopConfig = parse_config(&ctx.config).map_err(NodeError::InvalidConfig)?;
        let again = match &config.condition {
            Some(expr) => self.evaluator.evaluate_bool(expr, &ctx.variables_value())?,
            None => true,
        };

        // `iteration` is the pass that just finished; another pass would
        // be number `iteration + 1`.
        if again && ctx.iteration >= config.max_iterations {
            return Err(NodeError::LoopBoundExceeded {
                max_iterations: config.max_iterations,
            });
        }
        Ok(NodeOutcome::Branch { result: again })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::ctx;
    use serde_json::json;

    #[tokio::test]
    async fn continues_while_condition_holds() {
        let node = LoopNode::default();
        let config = json!({ "maxIterations": 5, "condition": "count < 3" });

        let again = node.execute(&ctx("l", config.clone(), json!({ "count": 1 }))).await;
        let done = node.execute(&ctx("l", config, json!({ "count": 3 }))).await;

        assert_eq!(again, Ok(NodeOutcome::Branch { result: true }));
        assert_eq!(done, Ok(NodeOutcome::Branch { result: false }));
    }

    #[tokio::test]
    async fn exceeding_the_bound_is_an_error() {
        let node = LoopNode::default();
        let mut context = ctx("l", json!({ "maxIterations": 2 }), json!({}));
        context.iteration = 2;

        assert_eq!(
            node.execute(&context).await,
            Err(NodeError::LoopBoundExceeded { max_iterations: 2 })
        );
    }

    #[test]
    fn zero_bound_is_invalid() {
        let node = LoopNode::default();
        assert!(node.validate_config(&json!({ "maxIterations": 0 })).is_err());
        assert!(node.validate_config(&json!({})).is_err());
    }
}
