use serde::{Deserialize, Serialize};

use crate::model::{Action, SuiteId, TestCaseId};

/// A compiled suite execution plan, ready for a runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    pub plan: PlanMetadata,
    /// Tests from other suites the members need, transitively, in dependency
    /// order. The runner resolves them on demand, never as suite results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_steps: Vec<PlanStep>,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn external_step(&self, test_case_id: &str) -> Option<&PlanStep> {
        self.external_steps
            .iter()
            .find(|s| s.test_case_id == test_case_id)
    }
}

/// Metadata about the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMetadata {
    pub suite_id: SuiteId,
    pub name: String,
    pub tests_total: usize,
    pub edges_total: usize,
    pub levels_total: usize,
    /// Tests from outside the suite that members need, directly or through
    /// another external test, in dependency order. Unresolvable ids are
    /// listed too but have no external step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_tests: Vec<TestCaseId>,
}

/// One test in the compiled plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub order: usize,
    pub test_case_id: TestCaseId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub enabled: bool,
    /// Dependency depth within the suite; steps sharing a level are independent.
    pub level: usize,
    /// Suite members that must pass before this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TestCaseId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyHint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_profiles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_setup: Vec<ActionBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<CleanupBlock>,
}

/// How one enabled `TestDependency` prerequisite should be satisfied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyHint {
    pub prerequisite_id: String,
    pub test_case_id: TestCaseId,
    /// The dependency is a member of the planned suite and runs in it.
    pub in_suite: bool,
    pub use_cache: bool,
    pub cache_expiry_ms: u64,
    /// A fresh passing result is cached right now.
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionBlock {
    pub prerequisite_id: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupBlock {
    pub prerequisite_id: String,
    pub always_run: bool,
    pub actions: Vec<Action>,
}
