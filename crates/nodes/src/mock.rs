//! `MockAction` — a test double for [`Action`].
//!
//! Useful in unit and integration tests where a real action provider is
//! either unavailable or irrelevant.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Action, ActionRequest, NodeError};

/// Behaviour injected into `MockAction` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
    /// Fail with a `Retryable` error for the first `times` calls, then
    /// return the value.
    FailThenReturn { times: u32, value: Value },
    /// Sleep, then return the value.
    Sleep(Duration, Value),
}

/// A mock action that records every call it receives and returns a
/// programmer-specified result.
pub struct MockAction {
    /// What the action will do when `call` is invoked.
    pub behaviour: MockBehaviour,
    /// All requests seen by this action (in call order).
    calls: Arc<Mutex<Vec<ActionRequest>>>,
    failures: AtomicU32,
}

impl MockAction {
    fn with(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
            failures: AtomicU32::new(0),
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(value: Value) -> Self {
        Self::with(MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::FailRetryable(msg.into()))
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that fails `times` times before succeeding.
    pub fn flaky(times: u32, value: Value) -> Self {
        Self::with(MockBehaviour::FailThenReturn { times, value })
    }

    /// Create a mock that takes `duration` before succeeding.
    pub fn sleeping(duration: Duration, value: Value) -> Self {
        Self::with(MockBehaviour::Sleep(duration, value))
    }

    /// Shared handle to the recorded requests; stays valid after the mock
    /// is moved into a registry.
    pub fn calls(&self) -> Arc<Mutex<Vec<ActionRequest>>> {
        Arc::clone(&self.calls)
    }

    /// Number of times this action has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Action for MockAction {
    async fn call(&self, request: ActionRequest) -> Result<Value, NodeError> {
        self.calls.lock().unwrap().push(request);

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::FailRetryable(msg) => Err(NodeError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => Err(NodeError::Fatal(msg.clone())),
            MockBehaviour::FailThenReturn { times, value } => {
                if self.failures.fetch_add(1, Ordering::SeqCst) < *times {
                    Err(NodeError::Retryable("flaky failure".into()))
                } else {
                    Ok(value.clone())
                }
            }
            MockBehaviour::Sleep(duration, value) => {
                tokio::time::sleep(*duration).await;
                Ok(value.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use uuid::Uuid;

    fn request() -> ActionRequest {
        ActionRequest {
            workflow_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "n".into(),
            input: Value::Null,
            variables: Map::new(),
        }
    }

    #[tokio::test]
    async fn flaky_recovers_after_n_failures() {
        let action = MockAction::flaky(2, json!("ok"));
        assert!(action.call(request()).await.is_err());
        assert!(action.call(request()).await.is_err());
        assert_eq!(action.call(request()).await, Ok(json!("ok")));
        assert_eq!(action.call_count(), 3);
    }
}
