use std::fmt::Write;

use crate::emit::util::{edge_label, escape};
use crate::graph::builder::DependencyGraph;

/// Emit a dependency graph as a Mermaid flowchart.
///
/// Test ids are free-form, so nodes are keyed by graph index (`n0`, `n1`,
/// ...) and the id or name is only used as the label.
pub fn emit_mermaid(dg: &DependencyGraph) -> String {
    let mut out = String::from("graph TD\n");

    for idx in dg.graph.node_indices() {
        let node = &dg.graph[idx];
        let label = escape(node.label());
        let key = idx.index();
        if node.is_member() {
            let _ = writeln!(out, "  n{key}[\"{label}\"]");
        } else {
            let _ = writeln!(out, "  n{key}([\"{label}\"])");
        }
        if node.is_phantom() {
            let _ = writeln!(out, "  class n{key} missing");
        } else if !node.is_member() {
            let _ = writeln!(out, "  class n{key} external");
        }
    }

    for edge in dg.graph.edge_indices() {
        let Some((src, dst)) = dg.graph.edge_endpoints(edge) else {
            continue;
        };
        let provenance = &dg.graph[edge].provenance;
        let arrow = if provenance.iter().any(|p| p.enabled) {
            "-->"
        } else {
            "-.->"
        };
        let _ = writeln!(
            out,
            "  n{} {arrow}|\"{}\"| n{}",
            src.index(),
            escape(&edge_label(provenance)),
            dst.index()
        );
    }

    out.push_str("  classDef missing stroke:#d00,color:#d00\n");
    out.push_str("  classDef external stroke-dasharray:4\n");
    out
}
