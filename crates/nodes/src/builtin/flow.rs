//! `fork` and `join`: pure control-flow nodes. All of their behaviour lives
//! in the scheduler's edge handling; executing them is a no-op.

use async_trait::async_trait;

use crate::{NodeContext, NodeError, NodeExecutor, NodeOutcome, NodeRole};

/// Activates every outgoing edge (parallel branches).
#[derive(Debug, Default)]
pub struct ForkNode;

#[async_trait]
impl NodeExecutor for ForkNode {
    fn role(&self) -> NodeRole {
        NodeRole::Fork
    }

    async fn execute(&self, _ctx: &NodeContext) -> Result<NodeOutcome, NodeError> {
        Ok(NodeOutcome::empty())
    }
}

/// Barrier that becomes ready once every incoming branch has arrived.
#[derive(Debug, Default)]
pub struct JoinNode;

#[async_trait]
impl NodeExecutor for JoinNode {
    fn role(&self) -> NodeRole {
        NodeRole::Join
    }

    async fn execute(&self, _ctx: &NodeContext) -> Result<NodeOutcome, NodeError> {
        Ok(NodeOutcome::empty())
    }
}
