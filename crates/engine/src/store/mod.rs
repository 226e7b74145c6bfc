//! The Definition Store boundary.
//!
//! The engine reads definitions and persists executions and triggers
//! through [`DefinitionStore`]; it never talks to a database directly.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Trigger, WorkflowDefinition, WorkflowExecution};

#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Persist one definition version. Versions are never overwritten.
    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    /// Latest version of a definition.
    async fn get_definition(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Insert or replace an execution together with its node log.
    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError>;

    async fn get_execution(&self, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError>;

    async fn save_trigger(&self, trigger: &Trigger) -> Result<(), StoreError>;

    async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>, StoreError>;

    /// Every trigger, oldest first.
    async fn list_triggers(&self) -> Result<Vec<Trigger>, StoreError>;

    /// Returns `false` when no such trigger existed.
    async fn delete_trigger(&self, id: Uuid) -> Result<bool, StoreError>;
}
