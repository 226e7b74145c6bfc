//! Built-in node types.
//!
//! | type        | role   | behaviour |
//! |-------------|--------|-----------|
//! | `task`      | Step   | invokes an action through the `ActionProvider` |
//! | `condition` | Branch | evaluates an expression; edges pick the branch |
//! | `delay`     | Step   | parks the branch until a wall-clock deadline |
//! | `fork`      | Fork   | activates every outgoing edge |
//! | `join`      | Join   | waits for every incoming branch |
//! | `loop`      | Loop   | re-enters its body under an iteration bound |

mod condition;
mod delay;
mod flow;
mod loop_node;
mod task;

pub use condition::{ConditionConfig, ConditionNode};
pub use delay::{DelayConfig, DelayNode};
pub use flow::{ForkNode, JoinNode};
pub use loop_node::{LoopConfig, LoopNode};
pub use task::{TaskConfig, TaskNode};

pub const TASK: &str = "task";
pub const CONDITION: &str = "condition";
pub const DELAY: &str = "delay";
pub const FORK: &str = "fork";
pub const JOIN: &str = "join";
pub const LOOP: &str = "loop";

/// Deserialize a node config, mapping failures to a readable message.
pub(crate) fn parse_config<T: serde::de::DeserializeOwned>(
    config: &serde_json::Value,
) -> Result<T, String> {
    serde_json::from_value(config.clone()).map_err(|e| e.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::{Map, Value};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use crate::NodeContext;

    pub fn ctx(node_id: &str, config: Value, variables: Value) -> NodeContext {
        let variables = match variables {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        NodeContext {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: node_id.to_owned(),
            config,
            variables,
            attempt: 1,
            iteration: 1,
            cancel: CancellationToken::new(),
        }
    }
}
