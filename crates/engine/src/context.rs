//! Per-execution mutable state.
//!
//! [`ExecutionContext`] owns the [`WorkflowExecution`] record of one run plus
//! the bookkeeping the scheduler needs: node phases, edge resolutions,
//! attempt and iteration counters. Everything sits behind one mutex, so
//! completions arriving from parallel branches are applied one at a time
//! and never interleave.
//!
//! Edge semantics:
//! - a completed node resolves each outgoing edge as taken or not taken
//!   (condition evaluated against the variables after the node's writes);
//! - a skipped node resolves all its outgoing edges as not taken;
//! - a join fires once every incoming edge is resolved and at least one
//!   was taken, any other node fires on its first taken edge;
//! - a node whose incoming edges are all not taken is skipped.
//!
//! A completion is applied in three steps by the single dispatch loop:
//! [`ExecutionContext::mark_completed`] records the attempt and resolves
//! the node's outgoing edges, [`ExecutionContext::set_variables`] merges
//! its writes, and [`ExecutionContext::advance_frontier`] promotes or skips
//! the nodes downstream.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use nodes::{ExpressionEvaluator, NodeError, NodeOutcome, NodeRole};

use crate::error::ExecutionFailure;
use crate::models::{
    CompensationFailure, ExecutionStatus, NodeExecutionRecord, NodeStatus, WorkflowExecution,
};
use crate::validator::ValidatedGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Ready,
    Running,
    /// Parked on the timer wheel (retry back-off or `delay`).
    Waiting,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeState {
    Pending,
    Taken,
    NotTaken,
}

#[derive(Debug, Clone)]
struct NodeState {
    phase: Phase,
    attempt: u32,
    iteration: u32,
    /// Log index of the current attempt's record.
    record: Option<usize>,
}

impl NodeState {
    fn new() -> Self {
        Self {
            phase: Phase::Pending,
            attempt: 0,
            iteration: 1,
            record: None,
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self.phase, Phase::Ready | Phase::Running | Phase::Waiting)
    }
}

struct RunState {
    execution: WorkflowExecution,
    nodes: Vec<NodeState>,
    edges: Vec<EdgeState>,
    /// Nodes made ready since the last `advance_frontier`.
    fresh: Vec<usize>,
}

/// Identifies one attempt of one node. Results carrying a stale attempt
/// (for example from before a loop reset) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRef {
    pub node: usize,
    pub record: usize,
}

/// Everything needed to run one attempt.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub attempt_ref: AttemptRef,
    pub attempt: u32,
    pub iteration: u32,
    pub variables: Map<String, Value>,
}

/// One compensation to run, in walk order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationStep {
    pub record: usize,
    pub node_id: String,
    pub action: String,
    /// The output of the node being undone.
    pub input: Value,
}

pub struct ExecutionContext {
    graph: Arc<ValidatedGraph>,
    evaluator: ExpressionEvaluator,
    state: Mutex<RunState>,
}

impl ExecutionContext {
    pub fn new(graph: Arc<ValidatedGraph>, execution: WorkflowExecution) -> Self {
        let nodes = vec![NodeState::new(); graph.nodes().len()];
        let edges = vec![EdgeState::Pending; graph.edges().len()];
        Self {
            graph,
            evaluator: ExpressionEvaluator::new(),
            state: Mutex::new(RunState {
                execution,
                nodes,
                edges,
                fresh: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn graph(&self) -> &Arc<ValidatedGraph> {
        &self.graph
    }

    pub fn execution_id(&self) -> Uuid {
        self.lock().execution.id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.lock().execution.status
    }

    pub fn snapshot(&self) -> WorkflowExecution {
        self.lock().execution.clone()
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.lock().execution.variables.get(name).cloned()
    }

    pub fn variables(&self) -> Map<String, Value> {
        self.lock().execution.variables.clone()
    }

    /// Merge `batch` into the variables atomically.
    pub fn set_variables(&self, batch: Map<String, Value>) {
        self.lock().execution.variables.extend(batch);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `pending → running` with the entry node ready. Returns false if the
    /// run was cancelled before it started.
    pub fn start(&self) -> bool {
        let mut state = self.lock();
        if state.execution.status != ExecutionStatus::Pending {
            return false;
        }
        state.execution.status = ExecutionStatus::Running;
        state.execution.started_at = Some(Utc::now());

        let entry = self.graph.entry();
        state.nodes[entry].phase = Phase::Ready;
        let id = self.graph.node(entry).node.id.clone();
        state.execution.frontier.insert(id);
        state.fresh.push(entry);
        true
    }

    /// Open a new attempt for a ready (or retry-waiting) node.
    ///
    /// Returns `None` once the execution has left `running`, which is the
    /// cancellation checkpoint before every dispatch.
    pub fn begin_attempt(&self, node: usize) -> Option<Dispatch> {
        let mut state = self.lock();
        if state.execution.status != ExecutionStatus::Running {
            return None;
        }
        if !matches!(state.nodes[node].phase, Phase::Ready | Phase::Waiting) {
            return None;
        }

        let node_id = self.graph.node(node).node.id.clone();
        let record = state.execution.node_logs.len();
        let attempt = state.nodes[node].attempt + 1;
        state.execution.node_logs.push(NodeExecutionRecord {
            node_id: node_id.clone(),
            status: NodeStatus::Running,
            attempt,
            started_at: Some(Utc::now()),
            completed_at: None,
            error: None,
            output: None,
        });
        state.execution.frontier.insert(node_id);

        let slot = &mut state.nodes[node];
        slot.phase = Phase::Running;
        slot.attempt = attempt;
        slot.record = Some(record);
        let iteration = slot.iteration;

        Some(Dispatch {
            attempt_ref: AttemptRef { node, record },
            attempt,
            iteration,
            variables: state.execution.variables.clone(),
        })
    }

    fn is_current(state: &RunState, at: AttemptRef) -> bool {
        state.execution.status == ExecutionStatus::Running
            && state.nodes[at.node].record == Some(at.record)
            && matches!(state.nodes[at.node].phase, Phase::Running | Phase::Waiting)
    }

    /// Park a node on the timer wheel; its record stays `running`.
    pub fn mark_suspended(&self, at: AttemptRef) -> bool {
        let mut state = self.lock();
        if !Self::is_current(&state, at) {
            return false;
        }
        state.nodes[at.node].phase = Phase::Waiting;
        true
    }

    /// Record a successful attempt and resolve its outgoing edges, with
    /// conditions evaluated against the variables plus the node's writes.
    /// Returns those writes for [`ExecutionContext::set_variables`], or
    /// `None` for a stale attempt.
    ///
    /// Fails without changing anything when an edge condition cannot be
    /// evaluated or a condition node has several true edges; the caller
    /// then fails the node.
    pub fn mark_completed(
        &self,
        at: AttemptRef,
        outcome: &NodeOutcome,
    ) -> Result<Option<Map<String, Value>>, NodeError> {
        let mut state = self.lock();
        if !Self::is_current(&state, at) {
            debug!(node = at.node, record = at.record, "ignoring stale completion");
            return Ok(None);
        }

        let (output, writes, branch) = match outcome {
            NodeOutcome::Completed { output, variables } => (output.clone(), variables.clone(), None),
            NodeOutcome::Branch { result } => (json!({ "result": result }), Map::new(), Some(*result)),
            NodeOutcome::Suspend { .. } => {
                return Err(NodeError::Fatal("a suspended node cannot complete".into()))
            }
        };

        let gnode = self.graph.node(at.node);
        let mut scope = state.execution.variables.clone();
        scope.extend(writes.clone());

        // Loop continuation: re-enter the body instead of resolving exits.
        if gnode.role == NodeRole::Loop && branch == Some(true) {
            self.close_record(&mut state, at, NodeStatus::Completed, Some(output), None);
            self.reenter_loop(&mut state, at.node);
            return Ok(Some(writes));
        }

        if let Some(result) = branch {
            scope.insert("result".into(), Value::Bool(result));
        }
        let decisions = self.resolve_outgoing(at.node, &Value::Object(scope))?;
        if gnode.role == NodeRole::Loop {
            // The loop exits; its loop-back edge will not be followed.
            if let Some(back) = gnode.loop_back {
                state.edges[back] = EdgeState::NotTaken;
            }
        }

        self.close_record(&mut state, at, NodeStatus::Completed, Some(output), None);
        for (edge, taken) in decisions {
            state.edges[edge] = if taken { EdgeState::Taken } else { EdgeState::NotTaken };
        }
        state.nodes[at.node].phase = Phase::Completed;
        let id = gnode.node.id.clone();
        state.execution.frontier.remove(&id);

        Ok(Some(writes))
    }

    /// Record a failed attempt. The node waits for another attempt when the
    /// error is retryable and fewer than `max_attempts` attempts were made;
    /// otherwise it is terminally failed.
    ///
    /// Returns the attempt count and whether the node will be retried, or
    /// `None` for a stale attempt.
    pub fn mark_failed(&self, at: AttemptRef, error: &NodeError, max_attempts: u32) -> Option<(u32, bool)> {
        let mut state = self.lock();
        if !Self::is_current(&state, at) {
            return None;
        }
        self.close_record(&mut state, at, NodeStatus::Failed, None, Some(error.to_string()));

        let attempt = state.nodes[at.node].attempt;
        let retrying = error.is_retryable() && attempt < max_attempts;
        if retrying {
            state.nodes[at.node].phase = Phase::Waiting;
        } else {
            state.nodes[at.node].phase = Phase::Failed;
            let id = self.graph.node(at.node).node.id.clone();
            state.execution.frontier.remove(&id);
        }
        Some((attempt, retrying))
    }

    /// Skip a pending node: it gets a `skipped` record and every edge
    /// leaving it is resolved as not taken. Returns false when the node is
    /// not pending.
    pub fn mark_skipped(&self, node: usize) -> bool {
        let mut state = self.lock();
        if state.nodes[node].phase != Phase::Pending {
            return false;
        }
        debug!(node_id = %self.graph.node(node).node.id, "skipping node");
        self.skip(&mut state, node);
        true
    }

    /// Promote pending nodes whose incoming edges allow it, skip the ones
    /// that can no longer run (propagating through their edges), and return
    /// every node made ready since the last call. Returns nothing once the
    /// execution has left `running`.
    pub fn advance_frontier(&self) -> Vec<usize> {
        loop {
            let dead = {
                let mut state = self.lock();
                if state.execution.status != ExecutionStatus::Running {
                    state.fresh.clear();
                    return Vec::new();
                }
                self.promote(&mut state)
            };
            if dead.is_empty() {
                break;
            }
            for node in dead {
                self.mark_skipped(node);
            }
        }
        std::mem::take(&mut self.lock().fresh)
    }

    /// Nodes that have not reached a terminal phase, in definition order.
    pub fn unresolved_nodes(&self) -> Vec<String> {
        let state = self.lock();
        state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.phase == Phase::Pending || n.in_flight())
            .map(|(i, _)| self.graph.node(i).node.id.clone())
            .collect()
    }

    /// `running → completed`.
    pub fn complete(&self) -> bool {
        let mut state = self.lock();
        if state.execution.status != ExecutionStatus::Running {
            return false;
        }
        state.execution.status = ExecutionStatus::Completed;
        state.execution.completed_at = Some(Utc::now());
        state.execution.frontier.clear();
        true
    }

    /// `running → failed`.
    pub fn fail(&self, failure: &ExecutionFailure) -> bool {
        self.finish_unsuccessfully(ExecutionStatus::Failed, failure)
    }

    /// `running → compensating`.
    pub fn begin_compensation(&self, failure: &ExecutionFailure) -> bool {
        self.finish_unsuccessfully(ExecutionStatus::Compensating, failure)
    }

    /// Any non-terminal status `→ failed`, for a run whose scheduler died.
    pub fn abort(&self, failure: &ExecutionFailure) -> bool {
        let mut state = self.lock();
        if state.execution.status.is_terminal() {
            return false;
        }
        state.execution.status = ExecutionStatus::Failed;
        state.execution.error = Some(failure.to_string());
        self.close_open_records(&mut state, "aborted: execution failed");
        state.execution.completed_at = Some(Utc::now());
        true
    }

    /// `compensating → compensated`.
    pub fn finish_compensation(&self) -> bool {
        let mut state = self.lock();
        if state.execution.status != ExecutionStatus::Compensating {
            return false;
        }
        state.execution.status = ExecutionStatus::Compensated;
        state.execution.completed_at = Some(Utc::now());
        true
    }

    /// `pending | running → cancelled`. Fails with the current status when
    /// the run can no longer be cancelled.
    pub fn cancel(&self) -> Result<(), ExecutionStatus> {
        let mut state = self.lock();
        match state.execution.status {
            ExecutionStatus::Pending | ExecutionStatus::Running => {}
            other => return Err(other),
        }
        state.execution.status = ExecutionStatus::Cancelled;
        state.execution.error = Some(ExecutionFailure::Cancelled.to_string());
        self.close_open_records(&mut state, "cancelled");
        state.execution.completed_at = Some(Utc::now());
        Ok(())
    }

    fn finish_unsuccessfully(&self, status: ExecutionStatus, failure: &ExecutionFailure) -> bool {
        let mut state = self.lock();
        if state.execution.status != ExecutionStatus::Running {
            return false;
        }
        state.execution.status = status;
        state.execution.error = Some(failure.to_string());
        self.close_open_records(&mut state, "aborted: execution failed");
        if status.is_terminal() {
            state.execution.completed_at = Some(Utc::now());
        }
        true
    }

    // -----------------------------------------------------------------------
    // Compensation bookkeeping
    // -----------------------------------------------------------------------

    /// Completed records of compensatable nodes, most recently completed
    /// first.
    pub fn compensation_plan(&self) -> Vec<CompensationStep> {
        let state = self.lock();
        let mut steps: Vec<(usize, &NodeExecutionRecord, String)> = state
            .execution
            .node_logs
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status == NodeStatus::Completed)
            .filter_map(|(i, r)| {
                let idx = self.graph.index_of(&r.node_id)?;
                let action = self.graph.node(idx).compensation.clone()?;
                Some((i, r, action))
            })
            .collect();
        steps.sort_by(|a, b| b.1.completed_at.cmp(&a.1.completed_at).then(b.0.cmp(&a.0)));

        steps
            .into_iter()
            .map(|(record, r, action)| CompensationStep {
                record,
                node_id: r.node_id.clone(),
                action,
                input: r.output.clone().unwrap_or(Value::Null),
            })
            .collect()
    }

    pub fn mark_compensated(&self, record: usize) {
        let mut state = self.lock();
        if let Some(r) = state.execution.node_logs.get_mut(record) {
            r.status = NodeStatus::Compensated;
        }
    }

    pub fn record_compensation_failure(&self, failure: CompensationFailure) {
        self.lock().execution.compensation_failures.push(failure);
    }

    // -----------------------------------------------------------------------
    // Internals (caller holds the lock)
    // -----------------------------------------------------------------------

    fn close_record(
        &self,
        state: &mut RunState,
        at: AttemptRef,
        status: NodeStatus,
        output: Option<Value>,
        error: Option<String>,
    ) {
        if let Some(record) = state.execution.node_logs.get_mut(at.record) {
            record.status = status;
            record.completed_at = Some(Utc::now());
            record.output = output;
            record.error = error;
        }
    }

    fn close_open_records(&self, state: &mut RunState, reason: &str) {
        let now = Utc::now();
        for record in &mut state.execution.node_logs {
            if record.status == NodeStatus::Running {
                record.status = NodeStatus::Failed;
                record.completed_at = Some(now);
                record.error = Some(reason.to_owned());
            }
        }
        state.execution.frontier.clear();
    }

    /// Decide every outgoing edge of `node` against `scope`.
    fn resolve_outgoing(&self, node: usize, scope: &Value) -> Result<Vec<(usize, bool)>, NodeError> {
        let gnode = self.graph.node(node);
        let mut decisions = Vec::with_capacity(gnode.outgoing.len());
        for &e in &gnode.outgoing {
            let taken = match (&gnode.role, &self.graph.edge(e).edge.condition) {
                (NodeRole::Fork, _) | (_, None) => true,
                (_, Some(condition)) => self.evaluator.evaluate_bool(condition, scope)?,
            };
            decisions.push((e, taken));
        }

        if gnode.role == NodeRole::Branch {
            let taken: Vec<String> = decisions
                .iter()
                .filter(|(_, taken)| *taken)
                .map(|(e, _)| self.graph.edge(*e).edge.id.clone())
                .collect();
            if taken.len() > 1 {
                return Err(NodeError::AmbiguousBranch { edges: taken });
            }
        }
        Ok(decisions)
    }

    fn skip(&self, state: &mut RunState, node: usize) {
        let gnode = self.graph.node(node);
        state.nodes[node].phase = Phase::Skipped;
        state.execution.node_logs.push(NodeExecutionRecord {
            node_id: gnode.node.id.clone(),
            status: NodeStatus::Skipped,
            attempt: 0,
            started_at: None,
            completed_at: Some(Utc::now()),
            error: None,
            output: None,
        });
        for &e in gnode.outgoing.iter().chain(gnode.loop_back.iter()) {
            state.edges[e] = EdgeState::NotTaken;
        }
    }

    /// Mark every pending node with a taken incoming edge ready (joins
    /// wait for all of them to resolve) and return the pending nodes whose
    /// incoming edges all resolved as not taken.
    fn promote(&self, state: &mut RunState) -> Vec<usize> {
        let mut dead = Vec::new();
        for (i, gnode) in self.graph.nodes().iter().enumerate() {
            if state.nodes[i].phase != Phase::Pending || gnode.incoming.is_empty() {
                continue;
            }
            let mut any_taken = false;
            let mut all_resolved = true;
            for &e in &gnode.incoming {
                match state.edges[e] {
                    EdgeState::Taken => any_taken = true,
                    EdgeState::Pending => all_resolved = false,
                    EdgeState::NotTaken => {}
                }
            }

            let fire = if gnode.role == NodeRole::Join {
                all_resolved && any_taken
            } else {
                any_taken
            };
            if fire {
                state.nodes[i].phase = Phase::Ready;
                state.execution.frontier.insert(gnode.node.id.clone());
                state.fresh.push(i);
            } else if all_resolved {
                dead.push(i);
            }
        }
        dead
    }

    /// Reset the body of loop node `node` for another pass and make the
    /// loop-back target ready again.
    fn reenter_loop(&self, state: &mut RunState, node: usize) {
        let gnode = self.graph.node(node);
        let Some(back) = gnode.loop_back else {
            return;
        };

        for &b in &gnode.body {
            let slot = &mut state.nodes[b];
            slot.phase = Phase::Pending;
            slot.attempt = 0;
            slot.record = None;
            slot.iteration = if b != node && self.graph.node(b).role == NodeRole::Loop {
                1
            } else {
                slot.iteration + 1
            };
        }
        for (e, edge) in self.graph.edges().iter().enumerate() {
            if gnode.body.contains(&edge.source) {
                state.edges[e] = EdgeState::Pending;
            }
        }
        state.edges[back] = EdgeState::Taken;

        let target = self.graph.edge(back).target;
        state.nodes[target].phase = Phase::Ready;
        let loop_id = gnode.node.id.clone();
        state.execution.frontier.remove(&loop_id);
        state.execution.frontier.insert(self.graph.node(target).node.id.clone());
        state.fresh.push(target);
        debug!(loop_id = %loop_id, iteration = state.nodes[node].iteration, "re-entering loop body");
    }
}
