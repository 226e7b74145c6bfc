//! `WorkflowEngine` — the façade every caller goes through.
//!
//! One engine is constructed per process and shared as a cheap cloneable
//! handle. It owns the worker pool, the validator cache, the table of live
//! executions and the running schedule loops; nothing here is a global.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use nodes::{ActionProvider, ActionRegistry, NodeExecutorRegistry};
use queue::WorkerPool;

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::{EngineError, ExecutionFailure, TriggerError};
use crate::models::{
    ExecutionStatus, StartRequest, Trigger, TriggerKind, TriggerType, WorkflowDefinition, WorkflowExecution,
};
use crate::scheduler::ExecutionScheduler;
use crate::store::{DefinitionStore, InMemoryStore};
use crate::trigger::{run_schedule, validate_kind};
use crate::validator::GraphValidator;

/// A run that has not been handed to the store for good yet.
struct ActiveRun {
    context: Arc<ExecutionContext>,
    cancel: CancellationToken,
    done: watch::Receiver<Option<WorkflowExecution>>,
}

struct Inner {
    config: EngineConfig,
    store: Arc<dyn DefinitionStore>,
    actions: Arc<dyn ActionProvider>,
    validator: GraphValidator,
    pool: WorkerPool,
    runs: DashMap<Uuid, ActiveRun>,
    schedules: DashMap<Uuid, CancellationToken>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<Inner>,
}

impl WorkflowEngine {
    /// Engine with the built-in node types; `task` nodes and compensation
    /// invoke `actions`.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn DefinitionStore>,
        actions: Arc<dyn ActionProvider>,
    ) -> Self {
        let registry = NodeExecutorRegistry::with_builtins(Arc::clone(&actions));
        Self::with_registry(config, store, actions, registry)
    }

    /// Engine with a caller-supplied node registry (plugins, custom types).
    pub fn with_registry(
        config: EngineConfig,
        store: Arc<dyn DefinitionStore>,
        actions: Arc<dyn ActionProvider>,
        registry: NodeExecutorRegistry,
    ) -> Self {
        let pool = WorkerPool::new(config.max_concurrent_nodes);
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                actions,
                validator: GraphValidator::new(Arc::new(registry)),
                pool,
                runs: DashMap::new(),
                schedules: DashMap::new(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// In-memory engine with the `echo` and `log` actions.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(ActionRegistry::with_builtins()),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn validator(&self) -> &GraphValidator {
        &self.inner.validator
    }

    /// Number of executions that have not reached a terminal status.
    pub fn active_executions(&self) -> usize {
        self.inner.runs.len()
    }

    // -----------------------------------------------------------------------
    // Definitions
    // -----------------------------------------------------------------------

    /// Validate and store `definition` as the next version of its id.
    #[instrument(skip(self, definition), fields(workflow_id = %definition.id))]
    pub async fn publish(&self, mut definition: WorkflowDefinition) -> Result<WorkflowDefinition, EngineError> {
        let previous = self.inner.store.get_definition(definition.id).await?;
        definition.version = previous.map_or(1, |d| d.version + 1);
        definition.created_at = Utc::now();

        self.inner.validator.validate(Arc::new(definition.clone()))?;
        self.inner.store.save_definition(&definition).await?;
        info!(version = definition.version, "workflow published");
        Ok(definition)
    }

    /// Latest version of a definition.
    pub async fn definition(&self, id: Uuid) -> Result<WorkflowDefinition, EngineError> {
        self.inner
            .store
            .get_definition(id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(id))
    }

    // -----------------------------------------------------------------------
    // Executions
    // -----------------------------------------------------------------------

    /// Create a `pending` execution and hand it to a scheduler task.
    #[instrument(skip(self, request), fields(workflow_id = %request.workflow_id, trigger = %request.trigger_type))]
    pub async fn start(&self, request: StartRequest) -> Result<WorkflowExecution, EngineError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(EngineError::ShuttingDown);
        }

        let definition = self.definition(request.workflow_id).await?;
        let graph = self.inner.validator.validate_cached(Arc::new(definition))?;
        let execution = WorkflowExecution::new(graph.definition(), request.trigger_type, request.payload);
        self.inner.store.save_execution(&execution).await?;

        let id = execution.id;
        let context = Arc::new(ExecutionContext::new(graph, execution.clone()));
        let cancel = self.inner.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(None);
        self.inner.runs.insert(
            id,
            ActiveRun {
                context: Arc::clone(&context),
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let scheduler = ExecutionScheduler::new(
            Arc::clone(&context),
            self.inner.pool.clone(),
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.actions),
            cancel.clone(),
            self.inner.config.default_retry,
            self.inner.config.default_execution_timeout(),
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = tokio::spawn(scheduler.run()).await {
                error!(execution_id = %id, "execution scheduler crashed: {}", err);
                cancel.cancel();
                if context.abort(&ExecutionFailure::SchedulerPanicked(err.to_string())) {
                    if let Err(err) = inner.store.save_execution(&context.snapshot()).await {
                        error!(execution_id = %id, "failed to persist aborted execution: {}", err);
                    }
                }
            }
            done_tx.send_replace(Some(context.snapshot()));
            inner.runs.remove(&id);
        });

        info!(execution_id = %id, "execution started");
        Ok(execution)
    }

    /// Cancel a pending or running execution.
    #[instrument(skip(self))]
    pub async fn cancel(&self, execution_id: Uuid) -> Result<WorkflowExecution, EngineError> {
        let live = self
            .inner
            .runs
            .get(&execution_id)
            .map(|run| (Arc::clone(&run.context), run.cancel.clone()));

        if let Some((context, token)) = live {
            context.cancel().map_err(|status| {
                if status.is_terminal() {
                    EngineError::AlreadyTerminal { execution_id, status }
                } else {
                    EngineError::NotCancellable { execution_id, status }
                }
            })?;
            token.cancel();
            info!("execution cancellation requested");
            return Ok(context.snapshot());
        }

        let mut stored = self
            .inner
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))?;
        if stored.status.is_terminal() {
            return Err(EngineError::AlreadyTerminal {
                execution_id,
                status: stored.status,
            });
        }

        // Left behind by a previous process; nothing is running it.
        warn!(status = %stored.status, "cancelling orphaned execution");
        stored.status = ExecutionStatus::Cancelled;
        stored.error = Some(ExecutionFailure::Cancelled.to_string());
        stored.frontier.clear();
        stored.completed_at = Some(Utc::now());
        self.inner.store.save_execution(&stored).await?;
        Ok(stored)
    }

    /// Live snapshot while running, the stored record afterwards.
    pub async fn execution(&self, execution_id: Uuid) -> Result<WorkflowExecution, EngineError> {
        if let Some(run) = self.inner.runs.get(&execution_id) {
            return Ok(run.context.snapshot());
        }
        self.inner
            .store
            .get_execution(execution_id)
            .await?
            .ok_or(EngineError::ExecutionNotFound(execution_id))
    }

    /// Wait until the execution reaches a terminal status.
    pub async fn wait(&self, execution_id: Uuid) -> Result<WorkflowExecution, EngineError> {
        let done = self.inner.runs.get(&execution_id).map(|run| run.done.clone());
        if let Some(mut done) = done {
            let finished = done
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|execution| execution.clone());
            if let Some(execution) = finished {
                return Ok(execution);
            }
        }
        self.execution(execution_id).await
    }

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    #[instrument(skip(self, kind))]
    pub async fn register_trigger(&self, workflow_id: Uuid, kind: TriggerKind) -> Result<Trigger, EngineError> {
        validate_kind(&kind)?;
        self.definition(workflow_id).await?;

        let trigger = Trigger::new(workflow_id, kind);
        self.inner.store.save_trigger(&trigger).await?;
        if matches!(trigger.kind, TriggerKind::Schedule { .. }) {
            self.arm_schedule(trigger.clone());
        }
        info!(trigger_id = %trigger.id, kind = %trigger.kind.trigger_type(), "trigger registered");
        Ok(trigger)
    }

    /// Triggers of one workflow, or all of them.
    pub async fn list_triggers(&self, workflow_id: Option<Uuid>) -> Result<Vec<Trigger>, EngineError> {
        let triggers = self.inner.store.list_triggers().await?;
        Ok(triggers
            .into_iter()
            .filter(|t| workflow_id.map_or(true, |id| t.workflow_id == id))
            .collect())
    }

    pub async fn trigger(&self, trigger_id: Uuid) -> Result<Trigger, EngineError> {
        self.inner
            .store
            .get_trigger(trigger_id)
            .await?
            .ok_or(EngineError::TriggerNotFound(trigger_id))
    }

    #[instrument(skip(self))]
    pub async fn delete_trigger(&self, trigger_id: Uuid) -> Result<(), EngineError> {
        if !self.inner.store.delete_trigger(trigger_id).await? {
            return Err(EngineError::TriggerNotFound(trigger_id));
        }
        if let Some((_, token)) = self.inner.schedules.remove(&trigger_id) {
            token.cancel();
        }
        info!("trigger deleted");
        Ok(())
    }

    /// Start the workflow behind a webhook trigger.
    #[instrument(skip(self, payload))]
    pub async fn fire_webhook(&self, trigger_id: Uuid, payload: Value) -> Result<WorkflowExecution, EngineError> {
        let trigger = self.trigger(trigger_id).await?;
        let actual = trigger.kind.trigger_type();
        if actual != TriggerType::Webhook {
            return Err(TriggerError::WrongType {
                trigger_id,
                expected: TriggerType::Webhook.as_str(),
                actual: actual.as_str(),
            }
            .into());
        }
        self.start(StartRequest {
            workflow_id: trigger.workflow_id,
            trigger_type: TriggerType::Webhook,
            payload,
        })
        .await
    }

    /// Start every workflow with an event trigger for `name`.
    #[instrument(skip(self, payload))]
    pub async fn emit_event(&self, name: &str, payload: Value) -> Result<Vec<WorkflowExecution>, EngineError> {
        let triggers = self.inner.store.list_triggers().await?;
        let mut started = Vec::new();
        for trigger in triggers {
            let TriggerKind::Event { event } = &trigger.kind else {
                continue;
            };
            if event != name {
                continue;
            }
            let request = StartRequest {
                workflow_id: trigger.workflow_id,
                trigger_type: TriggerType::Event,
                payload: payload.clone(),
            };
            match self.start(request).await {
                Ok(execution) => started.push(execution),
                Err(err) => warn!(trigger_id = %trigger.id, "event start failed: {}", err),
            }
        }
        info!(started = started.len(), "event delivered");
        Ok(started)
    }

    /// Arm every stored schedule trigger that is not running yet.
    pub async fn restore_schedules(&self) -> Result<usize, EngineError> {
        let mut armed = 0;
        for trigger in self.inner.store.list_triggers().await? {
            if matches!(trigger.kind, TriggerKind::Schedule { .. })
                && !self.inner.schedules.contains_key(&trigger.id)
            {
                self.arm_schedule(trigger);
                armed += 1;
            }
        }
        info!(armed, "schedules restored");
        Ok(armed)
    }

    fn arm_schedule(&self, trigger: Trigger) {
        let token = self.inner.shutdown.child_token();
        self.inner.schedules.insert(trigger.id, token.clone());
        tokio::spawn(run_schedule(self.clone(), trigger, token));
    }

    /// Stop schedules, cancel every live execution and close the worker
    /// pool so no queued node starts.
    pub fn shutdown(&self) {
        info!(active = self.inner.runs.len(), "engine shutting down");
        self.inner.shutdown.cancel();
        self.inner.pool.close();
    }
}
