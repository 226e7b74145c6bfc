//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// The scheduler uses the variant to decide retry behaviour:
/// - `Retryable` — the node is re-attempted with exponential back-off
///   until its retry policy is exhausted.
/// - everything else is permanent and fails the node immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Transient failure; the engine should re-try the node.
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),

    /// The node ran past its `max_duration_ms`.
    #[error("node timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// More than one conditional outgoing edge evaluated true.
    #[error("ambiguous branch: edges {edges:?} all evaluated true")]
    AmbiguousBranch { edges: Vec<String> },

    /// A loop asked to re-enter its body more often than allowed.
    #[error("loop exceeded its bound of {max_iterations} iterations")]
    LoopBoundExceeded { max_iterations: u32 },

    /// The node's configuration could not be interpreted.
    #[error("invalid node config: {0}")]
    InvalidConfig(String),

    /// An expression failed to evaluate.
    #[error("expression error: {0}")]
    Expression(String),

    /// The execution was cancelled while the node was running.
    #[error("node cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<crate::ExpressionError> for NodeError {
    fn from(err: crate::ExpressionError) -> Self {
        Self::Expression(err.to_string())
    }
}
