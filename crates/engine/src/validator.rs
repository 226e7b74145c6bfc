//! Graph validation — run this before persisting or executing a workflow.
//!
//! Rules enforced (every violation is collected, not just the first):
//! 1. Node and edge IDs are unique; the entry node exists.
//! 2. Every edge references existing nodes.
//! 3. Every node type is registered and its config is accepted by its
//!    executor; compensatable nodes name a compensation action.
//! 4. Every node except the entry has an incoming edge; join nodes have at
//!    least one.
//! 5. The graph without loop-back edges is acyclic (Kahn's algorithm) and
//!    every node is reachable from the entry.
//! 6. Fan-out is explicit: only `fork` and `condition` nodes have more than
//!    one outgoing edge. Fork edges are unconditional; condition edges are
//!    conditional and pairwise distinct.
//! 7. Loop-back edges leave a `loop` node, point at one of its ancestors,
//!    and enclose a body that is entered only at the target and left only
//!    through the loop node.
//!
//! A successful validation yields a [`ValidatedGraph`] with every executor
//! resolved, so nothing is looked up by type name while executing.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use nodes::{NodeExecutor, NodeExecutorRegistry, NodeRole};

use crate::error::{ValidationError, Violation};
use crate::models::{Edge, Node, WorkflowDefinition};

// ---------------------------------------------------------------------------
// ValidatedGraph
// ---------------------------------------------------------------------------

/// A node with its executor and adjacency resolved.
pub struct GraphNode {
    pub node: Node,
    pub executor: Arc<dyn NodeExecutor>,
    pub role: NodeRole,
    /// Indices of non-loop edges ending here.
    pub incoming: Vec<usize>,
    /// Indices of non-loop edges starting here.
    pub outgoing: Vec<usize>,
    /// Loop-back edge owned by a `loop` node.
    pub loop_back: Option<usize>,
    /// For `loop` nodes: every node re-entered on another pass, including
    /// the loop node itself and the loop-back target.
    pub body: Vec<usize>,
    /// Action that undoes this node, when it is compensatable.
    pub compensation: Option<String>,
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.node.id)
            .field("role", &self.role)
            .field("incoming", &self.incoming)
            .field("outgoing", &self.outgoing)
            .field("loop_back", &self.loop_back)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub edge: Edge,
    pub source: usize,
    pub target: usize,
}

/// A definition that passed validation, indexed for execution.
#[derive(Debug)]
pub struct ValidatedGraph {
    definition: Arc<WorkflowDefinition>,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    index: HashMap<String, usize>,
    entry: usize,
}

impl ValidatedGraph {
    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &GraphNode {
        &self.nodes[idx]
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn edge(&self, idx: usize) -> &GraphEdge {
        &self.edges[idx]
    }

    pub fn index_of(&self, node_id: &str) -> Option<usize> {
        self.index.get(node_id).copied()
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    /// Whether a failure of node `idx` sends the execution into compensation.
    pub fn requires_compensation(&self, idx: usize) -> bool {
        self.definition.compensate_on_failure || self.nodes[idx].node.compensatable
    }
}

// ---------------------------------------------------------------------------
// GraphValidator
// ---------------------------------------------------------------------------

type CachedValidation = Result<Arc<ValidatedGraph>, ValidationError>;

/// Validates definitions against a node registry and caches the outcome per
/// definition id and version.
pub struct GraphValidator {
    registry: Arc<NodeExecutorRegistry>,
    cache: DashMap<(Uuid, u32), CachedValidation>,
}

impl GraphValidator {
    pub fn new(registry: Arc<NodeExecutorRegistry>) -> Self {
        Self {
            registry,
            cache: DashMap::new(),
        }
    }

    /// Validate through the cache. Definitions are immutable per version, so
    /// a cached result (success or failure) is always current.
    pub fn validate_cached(&self, definition: Arc<WorkflowDefinition>) -> CachedValidation {
        let key = (definition.id, definition.version);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let result = self.validate(definition).map(Arc::new);
        self.cache.insert(key, result.clone());
        result
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Validate without touching the cache.
    pub fn validate(&self, definition: Arc<WorkflowDefinition>) -> Result<ValidatedGraph, ValidationError> {
        let def = &*definition;
        let mut violations = Vec::new();

        // -------------------------------------------------------------------
        // 1. Unique IDs and the entry node
        // -------------------------------------------------------------------
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, node) in def.nodes.iter().enumerate() {
            if index.contains_key(&node.id) {
                violations.push(Violation::DuplicateNodeId {
                    node_id: node.id.clone(),
                });
            } else {
                index.insert(node.id.clone(), i);
            }
        }

        let mut edge_ids: HashSet<&str> = HashSet::new();
        for edge in &def.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                violations.push(Violation::DuplicateEdgeId {
                    edge_id: edge.id.clone(),
                });
            }
        }

        let entry = index.get(&def.entry_node_id).copied();
        if entry.is_none() {
            violations.push(Violation::MissingEntryNode {
                node_id: def.entry_node_id.clone(),
            });
        }

        // -------------------------------------------------------------------
        // 2. Executors and configs
        // -------------------------------------------------------------------
        let mut executors: Vec<Option<Arc<dyn NodeExecutor>>> = Vec::with_capacity(def.nodes.len());
        for node in &def.nodes {
            let Some(executor) = self.registry.get(&node.node_type) else {
                violations.push(Violation::UnknownNodeType {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
                executors.push(None);
                continue;
            };
            if let Err(message) = executor.validate_config(&node.config) {
                violations.push(Violation::InvalidConfig {
                    node_id: node.id.clone(),
                    message,
                });
            } else if node.compensatable && executor.compensation_action(&node.config).is_none() {
                violations.push(Violation::MissingCompensation {
                    node_id: node.id.clone(),
                });
            }
            executors.push(Some(executor));
        }
        let role = |i: usize| -> NodeRole {
            executors[i].as_ref().map(|e| e.role()).unwrap_or(NodeRole::Step)
        };

        // -------------------------------------------------------------------
        // 3. Edge endpoints and adjacency
        // -------------------------------------------------------------------
        let n = def.nodes.len();
        let mut endpoints: Vec<Option<(usize, usize)>> = Vec::with_capacity(def.edges.len());
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut loop_backs: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (e, edge) in def.edges.iter().enumerate() {
            let source = index.get(&edge.source_node_id).copied();
            let target = index.get(&edge.target_node_id).copied();
            for (id, found) in [(&edge.source_node_id, source), (&edge.target_node_id, target)] {
                if found.is_none() {
                    violations.push(Violation::DanglingEdge {
                        edge_id: edge.id.clone(),
                        node_id: id.clone(),
                    });
                }
            }
            let (Some(source), Some(target)) = (source, target) else {
                endpoints.push(None);
                continue;
            };
            endpoints.push(Some((source, target)));
            if edge.loop_back {
                loop_backs[source].push(e);
            } else {
                outgoing[source].push(e);
                incoming[target].push(e);
            }
        }
        let target_of = |e: usize| endpoints[e].map(|(_, t)| t);
        let source_of = |e: usize| endpoints[e].map(|(s, _)| s);

        // -------------------------------------------------------------------
        // 4. Incoming edges
        // -------------------------------------------------------------------
        for (i, node) in def.nodes.iter().enumerate() {
            if !incoming[i].is_empty() {
                continue;
            }
            if role(i) == NodeRole::Join {
                violations.push(Violation::JoinWithoutIncoming {
                    node_id: node.id.clone(),
                });
            } else if Some(i) != entry {
                violations.push(Violation::MissingIncomingEdge {
                    node_id: node.id.clone(),
                });
            }
        }

        // -------------------------------------------------------------------
        // 5. Acyclicity (Kahn's algorithm) and reachability
        // -------------------------------------------------------------------
        let mut in_degree: Vec<usize> = incoming.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0usize;
        while let Some(i) = queue.pop_front() {
            visited += 1;
            for &e in &outgoing[i] {
                if let Some(t) = target_of(e) {
                    in_degree[t] -= 1;
                    if in_degree[t] == 0 {
                        queue.push_back(t);
                    }
                }
            }
        }
        let acyclic = visited == n;
        if !acyclic {
            let mut nodes: Vec<String> = (0..n)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| def.nodes[i].id.clone())
                .collect();
            nodes.sort();
            violations.push(Violation::Cycle { nodes });
        }

        if let Some(entry) = entry {
            let reachable = forward_reach(entry, &outgoing, &target_of);
            for (i, node) in def.nodes.iter().enumerate() {
                // Duplicates were reported already and are not indexed.
                if !reachable.contains(&i) && index.get(&node.id) == Some(&i) {
                    violations.push(Violation::Unreachable {
                        node_id: node.id.clone(),
                    });
                }
            }
        }

        // -------------------------------------------------------------------
        // 6. Fan-out rules
        // -------------------------------------------------------------------
        for (i, node) in def.nodes.iter().enumerate() {
            match role(i) {
                NodeRole::Fork => {
                    for &e in &outgoing[i] {
                        if def.edges[e].condition.is_some() {
                            violations.push(Violation::ConditionalForkEdge {
                                edge_id: def.edges[e].id.clone(),
                            });
                        }
                    }
                }
                NodeRole::Branch => {
                    let mut by_condition: BTreeMap<&str, Vec<String>> = BTreeMap::new();
                    for &e in &outgoing[i] {
                        match def.edges[e].condition.as_deref() {
                            Some(condition) => by_condition
                                .entry(condition.trim())
                                .or_default()
                                .push(def.edges[e].id.clone()),
                            None => violations.push(Violation::UnconditionalBranchEdge {
                                edge_id: def.edges[e].id.clone(),
                            }),
                        }
                    }
                    for (condition, edge_ids) in by_condition {
                        if edge_ids.len() > 1 {
                            violations.push(Violation::AmbiguousBranch {
                                node_id: node.id.clone(),
                                condition: condition.to_owned(),
                                edge_ids,
                            });
                        }
                    }
                }
                _ if outgoing[i].len() > 1 => violations.push(Violation::ImplicitFanOut {
                    node_id: node.id.clone(),
                    count: outgoing[i].len(),
                }),
                _ => {}
            }
        }

        // -------------------------------------------------------------------
        // 7. Loops
        // -------------------------------------------------------------------
        let mut bodies: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, node) in def.nodes.iter().enumerate() {
            if role(i) == NodeRole::Loop && loop_backs[i].len() != 1 {
                violations.push(Violation::LoopBackCount {
                    node_id: node.id.clone(),
                    count: loop_backs[i].len(),
                });
            }
        }
        for (s, edges) in loop_backs.iter().enumerate() {
            for &e in edges {
                let edge = &def.edges[e];
                let Some(t) = target_of(e) else { continue };
                let invalid = |reason: String| Violation::InvalidLoopBack {
                    edge_id: edge.id.clone(),
                    reason,
                };

                if role(s) != NodeRole::Loop {
                    violations.push(invalid(format!("source '{}' is not a loop node", edge.source_node_id)));
                    continue;
                }
                if edge.condition.is_some() {
                    violations.push(invalid("loop-back edges cannot carry a condition".into()));
                }
                if role(t) == NodeRole::Join {
                    violations.push(invalid(format!("target '{}' is a join node", edge.target_node_id)));
                    continue;
                }
                if !acyclic {
                    continue;
                }

                let forward = forward_reach(t, &outgoing, &target_of);
                if !forward.contains(&s) {
                    violations.push(invalid(format!(
                        "target '{}' is not upstream of '{}'",
                        edge.target_node_id, edge.source_node_id
                    )));
                    continue;
                }
                let backward = forward_reach(s, &incoming, &source_of);
                let mut body: Vec<usize> = forward.intersection(&backward).copied().collect();
                body.sort_unstable();

                for &b in &body {
                    if b != t && incoming[b].iter().any(|&ie| !source_of(ie).is_some_and(|x| body.contains(&x))) {
                        violations.push(invalid(format!(
                            "node '{}' inside the loop body is entered from outside it",
                            def.nodes[b].id
                        )));
                    }
                    if b != s && outgoing[b].iter().any(|&oe| !target_of(oe).is_some_and(|x| body.contains(&x))) {
                        violations.push(invalid(format!(
                            "node '{}' leaves the loop body before the loop node",
                            def.nodes[b].id
                        )));
                    }
                }
                bodies[s] = body;
            }
        }

        if !violations.is_empty() {
            debug!(workflow_id = %def.id, count = violations.len(), "definition rejected");
            return Err(ValidationError { violations });
        }

        // -------------------------------------------------------------------
        // Build the graph. Every lookup below succeeded above.
        // -------------------------------------------------------------------
        let edges: Vec<GraphEdge> = def
            .edges
            .iter()
            .zip(&endpoints)
            .filter_map(|(edge, ends)| {
                ends.map(|(source, target)| GraphEdge {
                    edge: edge.clone(),
                    source,
                    target,
                })
            })
            .collect();

        let mut nodes = Vec::with_capacity(n);
        for (i, (node, executor)) in def.nodes.iter().zip(executors).enumerate() {
            let Some(executor) = executor else {
                return Err(ValidationError {
                    violations: vec![Violation::UnknownNodeType {
                        node_id: node.id.clone(),
                        node_type: node.node_type.clone(),
                    }],
                });
            };
            let compensation = if node.compensatable {
                executor.compensation_action(&node.config)
            } else {
                None
            };
            nodes.push(GraphNode {
                node: node.clone(),
                role: executor.role(),
                executor,
                incoming: std::mem::take(&mut incoming[i]),
                outgoing: std::mem::take(&mut outgoing[i]),
                loop_back: loop_backs[i].first().copied(),
                body: std::mem::take(&mut bodies[i]),
                compensation,
            });
        }

        Ok(ValidatedGraph {
            entry: entry.unwrap_or_default(),
            definition,
            nodes,
            edges,
            index,
        })
    }
}

/// Nodes reachable from `start` (inclusive) following `adjacency`, where
/// `next` maps an edge index to the node on its far side.
fn forward_reach(
    start: usize,
    adjacency: &[Vec<usize>],
    next: &dyn Fn(usize) -> Option<usize>,
) -> HashSet<usize> {
    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(i) = queue.pop_front() {
        for &e in &adjacency[i] {
            if let Some(j) = next(e) {
                if seen.insert(j) {
                    queue.push_back(j);
                }
            }
        }
    }
    seen
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use nodes::ActionRegistry;
    use serde_json::json;

    fn validator() -> GraphValidator {
        let mut actions = ActionRegistry::with_builtins();
        actions.register("refund", Arc::new(nodes::action::EchoAction));
        GraphValidator::new(Arc::new(NodeExecutorRegistry::with_builtins(Arc::new(actions))))
    }

    fn task(id: &str) -> Node {
        Node::new(id, "task", json!({ "action": "echo" }))
    }

    fn validate(def: WorkflowDefinition) -> Result<ValidatedGraph, ValidationError> {
        validator().validate(Arc::new(def))
    }

    #[test]
    fn linear_definition_is_valid() {
        let graph = validate(WorkflowDefinition::new(
            "linear",
            "a",
            vec![task("a"), task("b"), task("c")],
            vec![Edge::new("ab", "a", "b"), Edge::new("bc", "b", "c")],
        ))
        .expect("should be valid");

        assert_eq!(graph.entry(), 0);
        assert_eq!(graph.node(1).incoming, vec![0]);
        assert_eq!(graph.node(1).outgoing, vec![1]);
    }

    #[test]
    fn fork_join_diamond_is_valid() {
        //   fork
        //  /    \
        // b      c
        //  \    /
        //   join
        validate(WorkflowDefinition::new(
            "diamond",
            "fork",
            vec![
                Node::new("fork", "fork", json!({})),
                task("b"),
                task("c"),
                Node::new("join", "join", json!({})),
            ],
            vec![
                Edge::new("e1", "fork", "b"),
                Edge::new("e2", "fork", "c"),
                Edge::new("e3", "b", "join"),
                Edge::new("e4", "c", "join"),
            ],
        ))
        .expect("should be valid");
    }

    #[test]
    fn every_violation_is_reported() {
        let err = validate(WorkflowDefinition::new(
            "broken",
            "a",
            vec![task("a"), task("a"), task("b"), Node::new("x", "webhook", json!({}))],
            vec![
                Edge::new("e1", "a", "b"),
                Edge::new("e1", "b", "ghost"),
            ],
        ))
        .unwrap_err();

        assert!(err.contains(|v| matches!(v, Violation::DuplicateNodeId { node_id } if node_id == "a")));
        assert!(err.contains(|v| matches!(v, Violation::DuplicateEdgeId { edge_id } if edge_id == "e1")));
        assert!(err.contains(|v| matches!(v, Violation::DanglingEdge { node_id, .. } if node_id == "ghost")));
        assert!(err.contains(|v| matches!(v, Violation::UnknownNodeType { node_type, .. } if node_type == "webhook")));
        assert!(err.contains(|v| matches!(v, Violation::Unreachable { node_id } if node_id == "x")));
    }

    #[test]
    fn cycle_is_detected() {
        // a → b → c → b
        let err = validate(WorkflowDefinition::new(
            "cyclic",
            "a",
            vec![task("a"), task("b"), task("c")],
            vec![
                Edge::new("ab", "a", "b"),
                Edge::new("bc", "b", "c"),
                Edge::new("cb", "c", "b"),
            ],
        ))
        .unwrap_err();

        assert!(err.contains(
            |v| matches!(v, Violation::Cycle { nodes } if nodes == &vec!["b".to_string(), "c".to_string()])
        ));
    }

    #[test]
    fn join_without_incoming_edges_is_rejected() {
        let err = validate(WorkflowDefinition::new(
            "join",
            "a",
            vec![task("a"), Node::new("j", "join", json!({}))],
            vec![],
        ))
        .unwrap_err();
        assert!(err.contains(|v| matches!(v, Violation::JoinWithoutIncoming { node_id } if node_id == "j")));
    }

    #[test]
    fn fan_out_must_be_explicit() {
        let err = validate(WorkflowDefinition::new(
            "fan",
            "a",
            vec![task("a"), task("b"), task("c")],
            vec![Edge::new("ab", "a", "b"), Edge::new("ac", "a", "c")],
        ))
        .unwrap_err();
        assert!(err.contains(|v| matches!(v, Violation::ImplicitFanOut { node_id, count: 2 } if node_id == "a")));
    }

    #[test]
    fn branch_edges_must_be_conditional_and_distinct() {
        let err = validate(WorkflowDefinition::new(
            "branch",
            "x",
            vec![
                Node::new("x", "condition", json!({ "expression": "amount > 1" })),
                task("y"),
                task("z"),
                task("w"),
            ],
            vec![
                Edge::new("xy", "x", "y").when("result == true"),
                Edge::new("xz", "x", "z").when(" result == true "),
                Edge::new("xw", "x", "w"),
            ],
        ))
        .unwrap_err();

        assert!(err.contains(|v| matches!(v, Violation::AmbiguousBranch { edge_ids, .. } if edge_ids.len() == 2)));
        assert!(err.contains(|v| matches!(v, Violation::UnconditionalBranchEdge { edge_id } if edge_id == "xw")));
    }

    #[test]
    fn fork_edges_must_be_unconditional() {
        let err = validate(WorkflowDefinition::new(
            "fork",
            "f",
            vec![Node::new("f", "fork", json!({})), task("a"), task("b")],
            vec![Edge::new("fa", "f", "a").when("go"), Edge::new("fb", "f", "b")],
        ))
        .unwrap_err();
        assert!(err.contains(|v| matches!(v, Violation::ConditionalForkEdge { edge_id } if edge_id == "fa")));
    }

    #[test]
    fn invalid_config_and_missing_compensation_are_reported() {
        let err = validate(WorkflowDefinition::new(
            "configs",
            "a",
            vec![
                Node::new("a", "task", json!({ "action": "nope" })),
                task("b").compensatable(),
            ],
            vec![Edge::new("ab", "a", "b")],
        ))
        .unwrap_err();
        assert!(err.contains(|v| matches!(v, Violation::InvalidConfig { node_id, .. } if node_id == "a")));
        assert!(err.contains(|v| matches!(v, Violation::MissingCompensation { node_id } if node_id == "b")));
    }

    #[test]
    fn loop_body_is_computed() {
        // a → b → c → l(loop) → d, with l ⇢ b
        let graph = validate(WorkflowDefinition::new(
            "loop",
            "a",
            vec![
                task("a"),
                task("b"),
                task("c"),
                Node::new("l", "loop", json!({ "maxIterations": 3 })),
                task("d"),
            ],
            vec![
                Edge::new("ab", "a", "b"),
                Edge::new("bc", "b", "c"),
                Edge::new("cl", "c", "l"),
                Edge::new("ld", "l", "d"),
                Edge::new("lb", "l", "b").loop_back(),
            ],
        ))
        .expect("should be valid");

        let l = graph.index_of("l").unwrap();
        assert_eq!(graph.node(l).body, vec![1, 2, 3]);
        assert_eq!(graph.node(l).loop_back, Some(4));
    }

    #[test]
    fn loop_back_rules() {
        let err = validate(WorkflowDefinition::new(
            "bad-loops",
            "a",
            vec![
                task("a"),
                task("b"),
                Node::new("l", "loop", json!({ "maxIterations": 2 })),
                task("c"),
            ],
            vec![
                Edge::new("ab", "a", "b"),
                Edge::new("bl", "b", "l"),
                Edge::new("lc", "l", "c"),
                // Target downstream of the loop node.
                Edge::new("lc-back", "l", "c").loop_back(),
                // Loop-back from a plain task.
                Edge::new("ba", "b", "a").loop_back(),
            ],
        ))
        .unwrap_err();

        assert!(err.contains(
            |v| matches!(v, Violation::InvalidLoopBack { edge_id, reason } if edge_id == "lc-back" && reason.contains("not upstream"))
        ));
        assert!(err.contains(
            |v| matches!(v, Violation::InvalidLoopBack { edge_id, reason } if edge_id == "ba" && reason.contains("not a loop"))
        ));
    }

    #[test]
    fn loop_without_loop_back_is_rejected() {
        let err = validate(WorkflowDefinition::new(
            "loop",
            "l",
            vec![Node::new("l", "loop", json!({ "maxIterations": 2 }))],
            vec![],
        ))
        .unwrap_err();
        assert!(err.contains(|v| matches!(v, Violation::LoopBackCount { count: 0, .. })));
    }

    #[test]
    fn validation_is_idempotent_and_cached() {
        let validator = validator();
        let def = Arc::new(WorkflowDefinition::new(
            "dup",
            "a",
            vec![task("a"), task("a")],
            vec![],
        ));

        let first = validator.validate(Arc::clone(&def)).unwrap_err();
        let second = validator.validate(Arc::clone(&def)).unwrap_err();
        assert_eq!(first, second);

        let cached = validator.validate_cached(Arc::clone(&def)).unwrap_err();
        let again = validator.validate_cached(def).unwrap_err();
        assert_eq!(cached, again);
        assert_eq!(validator.cached_len(), 1);
    }
}
