use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse_config;
use crate::{ExpressionEvaluator, NodeContext, NodeError, NodeExecutor, NodeOutcome, NodeRole};

/// Config of a `condition` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Boolean expression over the execution variables.
    pub expression: String,
}

/// Evaluates an expression; the outgoing edges decide which branch runs.
/// Never writes variables.
#[derive(Debug, Default)]
pub struct ConditionNode {
    evaluator: ExpressionEvaluator,
}

#[async_trait]
impl NodeExecutor for ConditionNode {
    fn role(&self) -> NodeRole {
        NodeRole::Branch
    }

    fn validate_config(&self, config: &Value) -> Result<(), String> {
        let config: ConditionConfig = parse_config(config)?;
        if config.expression.trim().is_empty() {
            return Err("condition expression is empty".into());
        }
        Ok(())
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<NodeOutcome, NodeError> {
        let config: ConditionConfig = parse_config(&ctx.config).map_err(NodeError::InvalidConfig)?;
        let result = self
            .evaluator
            .evaluate_bool(&config.expression, &ctx.variables_value())?;
        Ok(NodeOutcome::Branch { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::ctx;
    use serde_json::json;

    #[tokio::test]
    async fn evaluates_against_variables() {
        let node = ConditionNode::default();
        let config = json!({ "expression": "amount > 100" });

        let high = node.execute(&ctx("x", config.clone(), json!({ "amount": 500 }))).await;
        let low = node.execute(&ctx("x", config, json!({ "amount": 5 }))).await;

        assert_eq!(high, Ok(NodeOutcome::Branch { result: true }));
        assert_eq!(low, Ok(NodeOutcome::Branch { result: false }));
    }

    #[test]
    fn empty_expression_is_rejected() {
        let node = ConditionNode::default();
        assert!(node.validate_config(&json!({ "expression": "" })).is_err());
        assert!(node.validate_config(&json!({ "expression": "ok" })).is_ok());
    }
}
