//! Polymorphic dispatch table: node type string → executor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin::{
    ConditionNode, DelayNode, ForkNode, JoinNode, LoopNode, TaskNode, CONDITION, DELAY, FORK,
    JOIN, LOOP, TASK,
};
use crate::{ActionProvider, NodeExecutor};

/// Maps `node_type` strings to shared [`NodeExecutor`] implementations.
///
/// Lookups happen while a definition is validated; the validated graph
/// keeps the resolved `Arc`s, so nothing is looked up per execution.
#[derive(Clone, Default)]
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in node type; `task` nodes invoke `actions`.
    pub fn with_builtins(actions: Arc<dyn ActionProvider>) -> Self {
        let mut registry = Self::new();
        registry.register(TASK, Arc::new(TaskNode::new(actions)));
        registry.register(CONDITION, Arc::new(ConditionNode::default()));
        registry.register(DELAY, Arc::new(DelayNode));
        registry.register(FORK, Arc::new(ForkNode));
        registry.register(JOIN, Arc::new(JoinNode));
        registry.register(LOOP, Arc::new(LoopNode::default()));
        registry
    }

    /// Register (or replace) the executor for `node_type`.
    pub fn register(&mut self, node_type: impl Into<String>, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(node_type.into(), executor);
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.executors.contains_key(node_type)
    }

    /// Registered type names, sorted.
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
