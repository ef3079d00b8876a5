use std::collections::{HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::model::{Suite, SuiteId, TestCase, TestCaseId};
use crate::store::SuiteStore;

/// A `dependent -> prerequisite` relationship induced by one prerequisite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub from: TestCaseId,
    pub to: TestCaseId,
    pub prerequisite_id: String,
    pub enabled: bool,
}

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: TestCaseId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub state: NodeState,
    /// Index within the suite ordering, `None` for non-members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    Resolved { suite_id: SuiteId, enabled: bool },
    /// Referenced but not resolvable from the store.
    Phantom,
}

impl GraphNode {
    pub fn is_member(&self) -> bool {
        self.position.is_some()
    }

    pub fn is_phantom(&self) -> bool {
        matches!(self.state, NodeState::Phantom)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self.state, NodeState::Resolved { enabled: true, .. })
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(self.id.as_str())
    }
}

/// One graph edge per `(from, to)` pair. Every prerequisite that induced the
/// pair is kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraphEdge {
    pub provenance: Vec<DependencyEdge>,
}

/// A suite's dependency graph backed by petgraph.
pub struct DependencyGraph {
    pub suite_id: SuiteId,
    pub graph: DiGraph<GraphNode, GraphEdge>,
    /// Suite members in suite order.
    pub members: Vec<NodeIndex>,
    /// Prerequisites pointing a test at itself; never inserted as edges.
    pub self_references: Vec<DependencyEdge>,
    index: HashMap<TestCaseId, NodeIndex>,
    records: HashMap<TestCaseId, TestCase>,
}

/// Serializable view of a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub suite_id: SuiteId,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index(id).map(|idx| &self.graph[idx])
    }

    /// The resolved record for a node, if any.
    pub fn test_case(&self, id: &str) -> Option<&TestCase> {
        self.records.get(id)
    }

    /// Prerequisite nodes of `idx`, in the order their edges were added.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        // petgraph walks adjacency lists newest-first
        deps.reverse();
        deps
    }

    /// Prerequisite nodes reached through at least one enabled prerequisite.
    pub fn enabled_dependencies_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.dependencies_of(idx)
            .into_iter()
            .filter(|&dep| {
                self.graph
                    .find_edge(idx, dep)
                    .is_some_and(|e| self.graph[e].provenance.iter().any(|p| p.enabled))
            })
            .collect()
    }

    /// Nodes depending on `idx`, in the order their edges were added.
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        deps.reverse();
        deps
    }

    /// All prerequisite-level edges, including parallel ones.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.graph
            .edge_indices()
            .flat_map(|e| self.graph[e].provenance.iter().cloned())
            .collect()
    }

    pub fn member_ids(&self) -> Vec<TestCaseId> {
        self.members
            .iter()
            .map(|&idx| self.graph[idx].id.clone())
            .collect()
    }

    pub fn to_view(&self) -> GraphView {
        GraphView {
            suite_id: self.suite_id.clone(),
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self.edges(),
        }
    }
}

/// Build the dependency graph of a suite.
///
/// Members are added first in suite order, then every test reachable through
/// `TestDependency` prerequisites is pulled in breadth-first, whichever suite
/// owns it. Each id is fetched from the store at most once. Ids the store
/// cannot resolve become phantom nodes; building never fails.
pub fn build(suite: &Suite, store: &dyn SuiteStore) -> DependencyGraph {
    let mut builder = Builder {
        store,
        graph: DiGraph::new(),
        index: HashMap::new(),
        records: HashMap::new(),
        queue: VecDeque::new(),
    };

    let mut members = Vec::with_capacity(suite.test_case_ids.len());
    for (position, id) in suite.test_case_ids.iter().enumerate() {
        if builder.index.contains_key(id) {
            continue;
        }
        let idx = builder.ensure_node(id);
        builder.graph[idx].position = Some(position);
        members.push(idx);
    }

    let mut self_references = Vec::new();
    while let Some(id) = builder.queue.pop_front() {
        let Some(record) = builder.records.get(&id) else {
            continue;
        };
        let edges: Vec<DependencyEdge> = record
            .dependencies()
            .map(|(prereq, target)| DependencyEdge {
                from: id.clone(),
                to: target.to_owned(),
                prerequisite_id: prereq.id.clone(),
                enabled: prereq.enabled,
            })
            .collect();

        for edge in edges {
            if edge.from == edge.to {
                self_references.push(edge);
                continue;
            }
            let from = builder.index[&edge.from];
            let to = builder.ensure_node(&edge.to);
            match builder.graph.find_edge(from, to) {
                Some(existing) => builder.graph[existing].provenance.push(edge),
                None => {
                    builder.graph.add_edge(
                        from,
                        to,
                        GraphEdge {
                            provenance: vec![edge],
                        },
                    );
                }
            }
        }
    }

    tracing::debug!(
        suite = %suite.id,
        nodes = builder.graph.node_count(),
        edges = builder.graph.edge_count(),
        "dependency graph built"
    );

    DependencyGraph {
        suite_id: suite.id.clone(),
        graph: builder.graph,
        members,
        self_references,
        index: builder.index,
        records: builder.records,
    }
}

struct Builder<'a> {
    store: &'a dyn SuiteStore,
    graph: DiGraph<GraphNode, GraphEdge>,
    index: HashMap<TestCaseId, NodeIndex>,
    records: HashMap<TestCaseId, TestCase>,
    queue: VecDeque<TestCaseId>,
}

impl Builder<'_> {
    /// Return the node for `id`, resolving and enqueueing it on first sight.
    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }

        let node = match self.store.test_case(id) {
            Some(record) => {
                let node = GraphNode {
                    id: id.to_owned(),
                    name: Some(record.name.clone()),
                    state: NodeState::Resolved {
                        suite_id: record.suite_id.clone(),
                        enabled: record.enabled,
                    },
                    position: None,
                };
                self.records.insert(id.to_owned(), record);
                self.queue.push_back(id.to_owned());
                node
            }
            None => GraphNode {
                id: id.to_owned(),
                name: None,
                state: NodeState::Phantom,
                position: None,
            },
        };

        let idx = self.graph.add_node(node);
        self.index.insert(id.to_owned(), idx);
        idx
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::store::{InMemoryStore, StoreError};
    use crate::testing::{WorkspaceBuilder, depends_on};

    fn graph_for(store: &InMemoryStore, suite: &str) -> DependencyGraph {
        let suite = store.suite(suite).expect("suite missing");
        build(&suite, store)
    }

    #[test]
    fn builds_empty_suite() {
        let store = WorkspaceBuilder::new().suite("S", &[]).into_store();
        let g = graph_for(&store, "S");
        assert_eq!(g.graph.node_count(), 0);
        assert_eq!(g.graph.edge_count(), 0);
    }

    #[test]
    fn builds_linear_chain() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B", "C"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("C", "S", vec![depends_on("p2", "B")])
            .into_store();
        let g = graph_for(&store, "S");
        assert_eq!(g.graph.node_count(), 3);
        assert_eq!(g.graph.edge_count(), 2);
        assert_eq!(g.member_ids(), vec!["A", "B", "C"]);

        let b = g.node_index("B").expect("B");
        let deps: Vec<&str> = g
            .dependencies_of(b)
            .iter()
            .map(|&i| g.graph[i].id.as_str())
            .collect();
        assert_eq!(deps, vec!["A"]);
    }

    #[test]
    fn pulls_in_cross_suite_tests_transitively() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["D"])
            .suite("T", &["E", "F"])
            .test("D", "S", vec![depends_on("p1", "E")])
            .test("E", "T", vec![depends_on("p2", "F")])
            .test("F", "T", vec![])
            .into_store();
        let g = graph_for(&store, "S");
        assert_eq!(g.graph.node_count(), 3);
        let e = g.node("E").expect("E");
        assert!(!e.is_member());
        assert_eq!(
            e.state,
            NodeState::Resolved {
                suite_id: "T".into(),
                enabled: true
            }
        );
        assert!(g.node("F").is_some());
    }

    #[test]
    fn unresolved_reference_becomes_phantom() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A"])
            .test("A", "S", vec![depends_on("p1", "ghost")])
            .into_store();
        let g = graph_for(&store, "S");
        let ghost = g.node("ghost").expect("phantom node");
        assert!(ghost.is_phantom());
        assert_eq!(g.graph.edge_count(), 1);
    }

    #[test]
    fn parallel_prerequisites_share_one_edge() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A"), depends_on("p2", "A")])
            .into_store();
        let g = graph_for(&store, "S");
        assert_eq!(g.graph.edge_count(), 1);
        let ids: Vec<String> = g.edges().into_iter().map(|e| e.prerequisite_id).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn self_reference_is_kept_out_of_graph() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A"])
            .test("A", "S", vec![depends_on("p1", "A")])
            .into_store();
        let g = graph_for(&store, "S");
        assert_eq!(g.graph.edge_count(), 0);
        assert_eq!(g.self_references.len(), 1);
        assert_eq!(g.self_references[0].prerequisite_id, "p1");
    }

    #[test]
    fn duplicate_membership_keeps_first_position() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B", "A"])
            .test("A", "S", vec![])
            .test("B", "S", vec![])
            .into_store();
        let g = graph_for(&store, "S");
        assert_eq!(g.members.len(), 2);
        assert_eq!(g.node("A").and_then(|n| n.position), Some(0));
    }

    struct CountingStore {
        inner: InMemoryStore,
        lookups: AtomicUsize,
    }

    impl SuiteStore for CountingStore {
        fn test_case(&self, id: &str) -> Option<TestCase> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.test_case(id)
        }
        fn suite(&self, id: &str) -> Option<Suite> {
            self.inner.suite(id)
        }
        fn suites_containing(&self, test_case_id: &str) -> Vec<SuiteId> {
            self.inner.suites_containing(test_case_id)
        }
        fn update_suite(
            &self,
            suite_id: &str,
            test_case_ids: Vec<String>,
            expected_version: u64,
        ) -> Result<Suite, StoreError> {
            self.inner
                .update_suite(suite_id, test_case_ids, expected_version)
        }
    }

    #[test]
    fn each_test_is_fetched_once() {
        let inner = WorkspaceBuilder::new()
            .suite("S", &["A", "B", "C"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("C", "S", vec![depends_on("p2", "A"), depends_on("p3", "B")])
            .into_store();
        let store = CountingStore {
            inner,
            lookups: AtomicUsize::new(0),
        };
        let suite = store.suite("S").expect("suite");
        let g = build(&suite, &store);
        assert_eq!(g.graph.node_count(), 3);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn view_lists_nodes_and_edges() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .into_store();
        let view = graph_for(&store, "S").to_view();
        let json = serde_json::to_value(&view).expect("serialize");
        assert_eq!(json["nodes"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["edges"][0]["from"], "B");
        assert_eq!(json["edges"][0]["to"], "A");
        assert_eq!(json["nodes"][0]["state"], "resolved");
    }
}
