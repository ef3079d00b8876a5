use std::collections::HashSet;

use petgraph::graph::NodeIndex;

use crate::graph::builder::DependencyGraph;
use crate::model::TestCaseId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Find every distinct cycle reachable in the graph.
///
/// Depth-first search with white/gray/black marking; each back edge to a
/// gray node yields the cycle path, closed by repeating its first id
/// (`[A, B, A]`). Rotations of an already reported cycle are dropped.
///
/// The search recurses once per node on the current path, so stack use grows
/// with the longest dependency chain. Chains of a few thousand tests are
/// fine on the default main-thread stack; run deeper graphs on a thread with
/// a larger stack.
pub fn find_cycles(dg: &DependencyGraph) -> Vec<Vec<TestCaseId>> {
    let roots: Vec<NodeIndex> = dg.graph.node_indices().collect();
    search(dg, &roots, |_| true, false)
}

/// Find one cycle among the given nodes, ignoring edges that leave the set.
pub fn find_cycle_among(dg: &DependencyGraph, nodes: &[NodeIndex]) -> Option<Vec<TestCaseId>> {
    let allowed: HashSet<NodeIndex> = nodes.iter().copied().collect();
    search(dg, nodes, |idx| allowed.contains(&idx), true)
        .into_iter()
        .next()
}

fn search(
    dg: &DependencyGraph,
    roots: &[NodeIndex],
    allowed: impl Fn(NodeIndex) -> bool,
    stop_at_first: bool,
) -> Vec<Vec<TestCaseId>> {
    let mut colors = vec![Color::White; dg.graph.node_count()];
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut cycles = Vec::new();

    for &root in roots {
        if colors[root.index()] != Color::White || !allowed(root) {
            continue;
        }
        visit(
            dg,
            root,
            &allowed,
            &mut colors,
            &mut path,
            &mut seen,
            &mut cycles,
        );
        if stop_at_first && !cycles.is_empty() {
            break;
        }
    }

    cycles
}

/// One recursion level per node on `path`.
fn visit(
    dg: &DependencyGraph,
    node: NodeIndex,
    allowed: &impl Fn(NodeIndex) -> bool,
    colors: &mut [Color],
    path: &mut Vec<NodeIndex>,
    seen: &mut HashSet<Vec<NodeIndex>>,
    cycles: &mut Vec<Vec<TestCaseId>>,
) {
    colors[node.index()] = Color::Gray;
    path.push(node);

    for next in dg.dependencies_of(node) {
        if !allowed(next) {
            continue;
        }
        match colors[next.index()] {
            Color::White => visit(dg, next, allowed, colors, path, seen, cycles),
            Color::Gray => {
                // back edge: `next` is on the current path
                if let Some(start) = path.iter().position(|&n| n == next) {
                    let ring = &path[start..];
                    if seen.insert(canonical(ring)) {
                        let mut cycle: Vec<TestCaseId> =
                            ring.iter().map(|&i| dg.graph[i].id.clone()).collect();
                        cycle.push(dg.graph[next].id.clone());
                        cycles.push(cycle);
                    }
                }
            }
            Color::Black => {}
        }
    }

    path.pop();
    colors[node.index()] = Color::Black;
}

/// Rotate a ring so its smallest index comes first.
fn canonical(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    let min = ring
        .iter()
        .enumerate()
        .min_by_key(|(_, n)| **n)
        .map_or(0, |(i, _)| i);
    ring[min..].iter().chain(&ring[..min]).copied().collect()
}
