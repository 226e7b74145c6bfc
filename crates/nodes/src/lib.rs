//! `nodes` crate — the `NodeExecutor` trait, the executor registry and the
//! built-in node types.
//!
//! Every node type, built-in or plugin, implements
//! [`NodeExecutor`]. The engine resolves each node's declared type against
//! a [`NodeExecutorRegistry`] once, when a definition is validated, and
//! dispatches through the resulting trait objects afterwards.
//!
//! Side effects of `task` nodes go through an [`ActionProvider`], the
//! boundary to whatever actually performs the work (HTTP, database, LLM…).

pub mod action;
pub mod builtin;
pub mod error;
pub mod expression;
pub mod mock;
pub mod registry;
pub mod traits;

pub use action::{Action, ActionProvider, ActionRegistry, ActionRequest};
pub use error::NodeError;
pub use expression::{ExpressionError, ExpressionEvaluator};
pub use registry::NodeExecutorRegistry;
pub use traits::{NodeContext, NodeExecutor, NodeOutcome, NodeRole};
