use std::fmt::Write;

use crate::emit::util::{edge_label, escape};
use crate::graph::builder::DependencyGraph;

/// Emit a dependency graph as a DOT (Graphviz) diagram.
///
/// Edges point from a test to its prerequisite. Non-members are dashed,
/// unresolved ids are red, and edges held only by disabled prerequisites
/// are dotted.
pub fn emit_dot(dg: &DependencyGraph) -> String {
    let mut out = format!("digraph \"{}\" {{\n", escape(&dg.suite_id));

    for node in dg.graph.node_weights() {
        let mut attrs = format!("label=\"{}\"", escape(node.label()));
        if node.is_phantom() {
            attrs.push_str(", color=red, fontcolor=red");
        } else if !node.is_member() {
            attrs.push_str(", style=dashed");
        }
        if !node.is_phantom() && !node.is_enabled() {
            attrs.push_str(", fontcolor=gray");
        }
        let _ = writeln!(out, "  \"{}\" [{attrs}];", escape(&node.id));
    }

    for edge in dg.graph.edge_indices() {
        let Some((src, dst)) = dg.graph.edge_endpoints(edge) else {
            continue;
        };
        let provenance = &dg.graph[edge].provenance;
        let mut attrs = format!("label=\"{}\"", escape(&edge_label(provenance)));
        if provenance.iter().all(|p| !p.enabled) {
            attrs.push_str(", style=dotted");
        }
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [{attrs}];",
            escape(&dg.graph[src].id),
            escape(&dg.graph[dst].id)
        );
    }

    out.push_str("}\n");
    out
}
