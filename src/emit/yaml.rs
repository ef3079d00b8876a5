use serde::Serialize;

/// Emit any engine output (plan, graph view, validation result) as YAML.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn emit_yaml<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_yaml::to_string(value).map_err(|e| format!("yaml serialization failed: {e}"))
}

/// Emit any engine output as pretty-printed JSON with a trailing newline.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn emit_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value)
        .map(|mut s| {
            s.push('\n');
            s
        })
        .map_err(|e| format!("json serialization failed: {e}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{ManualClock, PrerequisiteCache};
    use crate::graph::builder::build;
    use crate::plan::{ExecutionPlan, compile};
    use crate::store::SuiteStore;
    use crate::testing::{WorkspaceBuilder, depends_on};

    fn chain_plan() -> ExecutionPlan {
        let store = WorkspaceBuilder::new()
            .suite("S", &["B", "A"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .into_store();
        let suite = store.suite("S").expect("suite");
        let dg = build(&suite, &store);
        let cache = PrerequisiteCache::new(Arc::new(ManualClock::new(0)));
        compile(&suite, &dg, &cache).expect("compile")
    }

    #[test]
    fn emits_plan_yaml() {
        let yaml = emit_yaml(&chain_plan()).expect("emit failed");
        assert!(yaml.contains("suite_id: S"));
        assert!(yaml.contains("order: 1"));
        assert!(yaml.contains("- A"));
    }

    #[test]
    fn emits_empty_steps() {
        let mut plan = chain_plan();
        plan.steps.clear();
        let yaml = emit_yaml(&plan).expect("emit failed");
        assert!(yaml.contains("steps: []"));
    }

    #[test]
    fn emits_plan_json() {
        let json = emit_json(&chain_plan()).expect("emit failed");
        assert!(json.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["steps"][0]["test_case_id"], "A");
        assert_eq!(value["steps"][1]["depends_on"][0], "A");
    }

    #[test]
    fn emits_unsized_slices() {
        let ids = ["A".to_owned(), "B".to_owned()];
        assert_eq!(emit_yaml(&ids[..]).expect("emit failed"), "- A\n- B\n");
    }
}
