//! In-process store backed by `DashMap`s.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::DefinitionStore;
use crate::error::StoreError;
use crate::models::{Trigger, WorkflowDefinition, WorkflowExecution};

/// Keeps everything in memory. Used by tests and by `serve` when no
/// database is configured.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// id → every published version, ascending.
    definitions: DashMap<Uuid, Vec<WorkflowDefinition>>,
    executions: DashMap<Uuid, WorkflowExecution>,
    triggers: DashMap<Uuid, Trigger>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryStore {
    async fn save_definition(&self, definition: &WorkflowDefinition) -> Result<(), StoreError> {
        let mut versions = self.definitions.entry(definition.id).or_default();
        versions.push(definition.clone());
        versions.sort_by_key(|d| d.version);
        Ok(())
    }

    async fn get_definition(&self, id: Uuid) -> Result<Option<WorkflowDefinition>, StoreError> {
        Ok(self
            .definitions
            .get(&id)
            .and_then(|versions| versions.last().cloned()))
    }

    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        self.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError> {
        Ok(self.executions.get(&id).map(|e| e.clone()))
    }

    async fn save_trigger(&self, trigger: &Trigger) -> Result<(), StoreError> {
        self.triggers.insert(trigger.id, trigger.clone());
        Ok(())
    }

    async fn get_trigger(&self, id: Uuid) -> Result<Option<Trigger>, StoreError> {
        Ok(self.triggers.get(&id).map(|t| t.clone()))
    }

    async fn list_triggers(&self) -> Result<Vec<Trigger>, StoreError> {
        let mut triggers: Vec<Trigger> = self.triggers.iter().map(|t| t.clone()).collect();
        triggers.sort_by_key(|t| t.created_at);
        Ok(triggers)
    }

    async fn delete_trigger(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.triggers.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, TriggerKind};
    use serde_json::json;

    #[tokio::test]
    async fn latest_definition_version_wins() {
        let store = InMemoryStore::new();
        let mut def = WorkflowDefinition::new("w", "a", vec![Node::new("a", "task", json!({}))], vec![]);
        def.version = 1;
        store.save_definition(&def).await.unwrap();
        def.version = 2;
        def.name = "renamed".into();
        store.save_definition(&def).await.unwrap();

        let latest = store.get_definition(def.id).await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.name, "renamed");
        assert!(store.get_definition(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn triggers_can_be_deleted_once() {
        let store = InMemoryStore::new();
        let trigger = Trigger::new(Uuid::new_v4(), TriggerKind::Manual);
        store.save_trigger(&trigger).await.unwrap();
        assert_eq!(store.list_triggers().await.unwrap().len(), 1);

        assert!(store.delete_trigger(trigger.id).await.unwrap());
        assert!(!store.delete_trigger(trigger.id).await.unwrap());
        assert!(store.get_trigger(trigger.id).await.unwrap().is_none());
    }
}
