use crate::graph::builder::DependencyEdge;

/// Escape a string for use inside a double-quoted DOT or Mermaid label.
pub(crate) fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Comma-separated prerequisite ids that induced one graph edge.
pub(crate) fn edge_label(provenance: &[DependencyEdge]) -> String {
    provenance
        .iter()
        .map(|p| p.prerequisite_id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(prerequisite_id: &str) -> DependencyEdge {
        DependencyEdge {
            from: "B".into(),
            to: "A".into(),
            prerequisite_id: prerequisite_id.into(),
            enabled: true,
        }
    }

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape(r#"a "b" \c"#), r#"a \"b\" \\c"#);
    }

    #[test]
    fn plain_text_is_unchanged() {
        assert_eq!(escape("Login flow"), "Login flow");
    }

    #[test]
    fn joins_parallel_prerequisites() {
        assert_eq!(edge_label(&[edge("p1"), edge("p2")]), "p1, p2");
    }
}
