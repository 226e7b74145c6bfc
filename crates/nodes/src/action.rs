//! The Node Action Provider boundary.
//!
//! A `task` node does not know how to call an HTTP endpoint or write a
//! row; it names an action, and an [`ActionProvider`] performs it. The
//! bundled [`ActionRegistry`] resolves names against a table of
//! [`Action`] handlers, which is enough for embedding and for tests;
//! deployments may plug in any other provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::NodeError;

/// Input handed to an action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub workflow_id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    /// The node's configured `input` (or, for compensation, the original
    /// node's output).
    pub input: Value,
    /// Execution variables at dispatch time.
    pub variables: Map<String, Value>,
}

/// Performs named side effects on behalf of `task` nodes and compensation.
#[async_trait]
pub trait ActionProvider: Send + Sync {
    async fn invoke(&self, action: &str, request: ActionRequest) -> Result<Value, NodeError>;

    /// Whether `action` can be invoked at all. Used at validation time.
    fn has_action(&self, action: &str) -> bool;
}

/// A single named handler.
#[async_trait]
pub trait Action: Send + Sync {
    async fn call(&self, request: ActionRequest) -> Result<Value, NodeError>;
}

/// Name → handler table implementing [`ActionProvider`].
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the `echo` and `log` actions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("echo", Arc::new(EchoAction));
        registry.register("log", Arc::new(LogAction));
        registry
    }

    /// Register (or replace) a handler.
    pub fn register(&mut self, name: impl Into<String>, action: Arc<dyn Action>) {
        self.actions.insert(name.into(), action);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ActionProvider for ActionRegistry {
    async fn invoke(&self, action: &str, request: ActionRequest) -> Result<Value, NodeError> {
        let handler = self
            .actions
            .get(action)
            .ok_or_else(|| NodeError::Fatal(format!("no action registered under '{action}'")))?;
        debug!(action, node_id = %request.node_id, "invoking action");
        handler.call(request).await
    }

    fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }
}

/// Returns its input unchanged.
pub struct EchoAction;

#[async_trait]
impl Action for EchoAction {
    async fn call(&self, request: ActionRequest) -> Result<Value, NodeError> {
        Ok(request.input)
    }
}

/// Logs its input and returns null.
pub struct LogAction;

#[async_trait]
impl Action for LogAction {
    async fn call(&self, request: ActionRequest) -> Result<Value, NodeError> {
        info!(
            execution_id = %request.execution_id,
            node_id = %request.node_id,
            input = %request.input,
            "log action"
        );
        Ok(Value::Null)
    }
}
