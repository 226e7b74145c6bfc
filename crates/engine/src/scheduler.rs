//! The dispatch loop of one execution.
//!
//! `ExecutionScheduler::run`:
//! 1. Moves the execution to `running` and dispatches the entry node.
//! 2. Spawns every ready node onto the shared [`WorkerPool`]; results come
//!    back through a per-run [`CompletionQueue`].
//! 3. On success, merges variables and dispatches whatever became ready.
//! 4. On a retryable failure, parks the node on the [`TimerWheel`] for its
//!    back-off; on a permanent one (or exhausted retries) fails or
//!    compensates the execution.
//! 5. `delay` nodes are parked on the timer wheel until their deadline.
//!    A wake-up that would fall after the execution deadline is not armed.
//! 6. Stops on cancellation, on the execution deadline, or once nothing is
//!    left to run. A run with unresolved nodes and nothing in flight or on
//!    the wheel is stalled and fails with a deadlock timeout at the
//!    deadline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use nodes::{ActionProvider, NodeContext, NodeError, NodeOutcome};
use queue::{CompletionQueue, TimerWheel, WorkerPool};

use crate::compensation::CompensationCoordinator;
use crate::context::{AttemptRef, ExecutionContext};
use crate::error::ExecutionFailure;
use crate::models::{ExecutionStatus, RetryPolicy};
use crate::store::DefinitionStore;

/// Result of one node attempt, sent back by its task.
#[derive(Debug)]
struct Finished {
    at: AttemptRef,
    result: Result<NodeOutcome, NodeError>,
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    /// Back-off elapsed; start the node's next attempt.
    Retry(usize),
    /// A `delay` node's deadline passed.
    Wake(AttemptRef),
}

/// How a run left the dispatch loop.
enum Exit {
    Drained,
    Cancelled,
    Failed { node: Option<usize>, failure: ExecutionFailure },
}

pub(crate) struct ExecutionScheduler {
    context: Arc<ExecutionContext>,
    pool: WorkerPool,
    store: Arc<dyn DefinitionStore>,
    actions: Arc<dyn ActionProvider>,
    cancel: CancellationToken,
    default_retry: RetryPolicy,
    timeout: Duration,
    deadline: Instant,
    completions: CompletionQueue<Finished>,
    timers: TimerWheel<Timer>,
}

impl ExecutionScheduler {
    pub(crate) fn new(
        context: Arc<ExecutionContext>,
        pool: WorkerPool,
        store: Arc<dyn DefinitionStore>,
        actions: Arc<dyn ActionProvider>,
        cancel: CancellationToken,
        default_retry: RetryPolicy,
        default_timeout: Duration,
    ) -> Self {
        let timeout = context
            .graph()
            .definition()
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default_timeout);
        Self {
            context,
            pool,
            store,
            actions,
            cancel,
            default_retry,
            timeout,
            deadline: deadline_after(timeout),
            completions: CompletionQueue::new(),
            timers: TimerWheel::new(),
        }
    }

    /// Drive the execution to a terminal status.
    #[instrument(skip(self), fields(execution_id = %self.context.execution_id()))]
    pub(crate) async fn run(mut self) {
        if !self.context.start() {
            debug!("execution was cancelled before it started");
            self.persist().await;
            return;
        }
        info!("execution running");
        self.persist().await;

        self.deadline = deadline_after(self.timeout);
        for node in self.context.advance_frontier() {
            self.dispatch(node);
        }

        let exit = self.drive().await;
        self.cancel.cancel();
        self.timers.clear();

        match exit {
            Exit::Drained => {
                if self.context.complete() {
                    info!("execution completed");
                }
            }
            Exit::Cancelled => {
                // Engine shutdown trips the token without going through
                // `WorkflowEngine::cancel`.
                let _ = self.context.cancel();
                info!("execution cancelled");
            }
            Exit::Failed { node, failure } => self.fail(node, failure).await,
        }
        self.persist().await;
    }

    async fn drive(&mut self) -> Exit {
        let deadline = self.deadline;
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        loop {
            if self.context.status() != ExecutionStatus::Running {
                return Exit::Cancelled;
            }

            if self.completions.is_idle() && self.timers.is_empty() {
                let waiting = self.context.unresolved_nodes();
                if waiting.is_empty() {
                    return Exit::Drained;
                }
                // Nothing can make progress any more; only the deadline or a
                // cancel ends the run.
                warn!(?waiting, "execution stalled");
                return tokio::select! {
                    _ = self.cancel.cancelled() => Exit::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Exit::Failed {
                        node: None,
                        failure: ExecutionFailure::DeadlockTimeout { after_ms: timeout_ms, waiting },
                    },
                };
            }

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return Exit::Cancelled,

                _ = tokio::time::sleep_until(deadline) => {
                    return Exit::Failed {
                        node: None,
                        failure: ExecutionFailure::Timeout { after_ms: timeout_ms },
                    };
                }

                Some(finished) = self.completions.next(), if !self.completions.is_idle() => {
                    if let Some(exit) = self.on_finished(finished) {
                        return exit;
                    }
                }

                Some(timer) = self.timers.next_expired(), if !self.timers.is_empty() => {
                    if let Some(exit) = self.on_timer(timer) {
                        return exit;
                    }
                }
            }
        }
    }

    /// Start an attempt of `node` on the worker pool.
    fn dispatch(&mut self, node: usize) {
        let Some(dispatch) = self.context.begin_attempt(node) else {
            return;
        };
        let graph = Arc::clone(self.context.graph());
        let gnode = graph.node(node);
        debug!(node_id = %gnode.node.id, attempt = dispatch.attempt, "dispatching node");

        let ctx = NodeContext {
            workflow_id: graph.definition().id,
            execution_id: self.context.execution_id(),
            node_id: gnode.node.id.clone(),
            config: gnode.node.config.clone(),
            variables: dispatch.variables,
            attempt: dispatch.attempt,
            iteration: dispatch.iteration,
            cancel: self.cancel.child_token(),
        };
        let executor = Arc::clone(&gnode.executor);
        let max_duration_ms = gnode.node.max_duration_ms;
        let at = dispatch.attempt_ref;
        let node_id = ctx.node_id.clone();
        let sender = self.completions.sender();

        let attempt = self.pool.spawn(async move {
            if ctx.cancel.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            match max_duration_ms {
                Some(ms) => tokio::time::timeout(Duration::from_millis(ms), executor.execute(&ctx))
                    .await
                    .unwrap_or(Err(NodeError::Timeout { after_ms: ms })),
                None => executor.execute(&ctx).await,
            }
        });
        tokio::spawn(async move {
            let result = match attempt.await {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => Err(NodeError::Fatal(err.to_string())),
                Err(err) => Err(NodeError::Fatal(format!("node executor panicked: {err}"))),
            };
            if sender.complete(Finished { at, result }).is_err() {
                debug!(node_id = %node_id, "execution gone before node result was delivered");
            }
        });
    }

    fn on_finished(&mut self, finished: Finished) -> Option<Exit> {
        let Finished { at, result } = finished;
        match result {
            Ok(NodeOutcome::Suspend { until }) => {
                if self.context.mark_suspended(at) {
                    let wait = (until - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    debug!(node = at.node, ?wait, "node suspended");
                    self.park(Timer::Wake(at), wait);
                }
                None
            }
            Ok(outcome) => self.complete(at, &outcome),
            Err(NodeError::Cancelled) if self.cancel.is_cancelled() => None,
            Err(err) => self.on_error(at, err),
        }
    }

    fn on_timer(&mut self, timer: Timer) -> Option<Exit> {
        match timer {
            Timer::Retry(node) => {
                self.dispatch(node);
                None
            }
            Timer::Wake(at) => self.complete(at, &NodeOutcome::empty()),
        }
    }

    fn complete(&mut self, at: AttemptRef, outcome: &NodeOutcome) -> Option<Exit> {
        match self.context.mark_completed(at, outcome) {
            Ok(Some(writes)) => {
                self.context.set_variables(writes);
                for node in self.context.advance_frontier() {
                    self.dispatch(node);
                }
                None
            }
            Ok(None) => None,
            // Ambiguous branches and broken edge conditions are permanent.
            Err(err) => self.on_error(at, err),
        }
    }

    /// Put `timer` on the wheel, unless it would only fire after the
    /// execution deadline. The node then stays waiting and the run stalls.
    fn park(&mut self, timer: Timer, wait: Duration) {
        let fires_in_time = Instant::now()
            .checked_add(wait)
            .is_some_and(|at| at <= self.deadline);
        if fires_in_time {
            self.timers.schedule(timer, wait);
        } else {
            warn!(?timer, ?wait, "wake-up falls after the execution deadline, not arming it");
        }
    }

    fn on_error(&mut self, at: AttemptRef, err: NodeError) -> Option<Exit> {
        let gnode = self.context.graph().node(at.node);
        let policy = gnode.node.retry.unwrap_or(self.default_retry);
        let node_id = gnode.node.id.clone();

        let Some((attempt, retrying)) = self.context.mark_failed(at, &err, policy.max_attempts) else {
            debug!(node_id = %node_id, "ignoring stale failure");
            return None;
        };
        if retrying {
            let delay = policy.delay_after(attempt);
            warn!(
                "node '{}' retryable error (attempt {}/{}), retrying in {:?}: {}",
                node_id, attempt, policy.max_attempts, delay, err
            );
            self.park(Timer::Retry(at.node), delay);
            return None;
        }

        error!(node_id = %node_id, attempts = attempt, "node failed: {}", err);
        Some(Exit::Failed {
            node: Some(at.node),
            failure: ExecutionFailure::NodeFailed {
                node_id,
                attempts: attempt,
                error: err,
            },
        })
    }

    /// Fail the execution, compensating first when required.
    async fn fail(&self, node: Option<usize>, failure: ExecutionFailure) {
        let graph = self.context.graph();
        let compensate = match node {
            Some(node) => graph.requires_compensation(node),
            None => graph.definition().compensate_on_failure,
        };

        if compensate && self.context.begin_compensation(&failure) {
            warn!("execution failed, compensating: {}", failure);
            self.persist().await;
            let failures = CompensationCoordinator::new(Arc::clone(&self.actions))
                .run(&self.context)
                .await;
            info!(failed_compensations = failures.len(), "execution compensated");
        } else if self.context.fail(&failure) {
            error!("execution failed: {}", failure);
        }
    }

    async fn persist(&self) {
        let snapshot = self.context.snapshot();
        if let Err(err) = self.store.save_execution(&snapshot).await {
            error!(status = %snapshot.status, "failed to persist execution: {}", err);
        }
    }
}

/// `now + timeout`, saturating far in the future for huge timeouts.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60))
}
