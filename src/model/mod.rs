pub mod prerequisite;

use serde::{Deserialize, Serialize};

pub use prerequisite::{Action, ActionKind, Prerequisite, PrerequisiteKind};

use prerequisite::enabled_by_default;

pub type TestCaseId = String;
pub type SuiteId = String;

/// A test case owned by exactly one suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: TestCaseId,
    #[serde(default)]
    pub name: String,
    pub suite_id: SuiteId,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<Prerequisite>,
}

impl TestCase {
    /// Iterate `(prerequisite, target)` for every test dependency.
    pub fn dependencies(&self) -> impl Iterator<Item = (&Prerequisite, &str)> {
        self.prerequisites
            .iter()
            .filter_map(|p| p.dependency_target().map(|target| (p, target)))
    }
}

/// An ordered collection of test cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    pub id: SuiteId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub test_case_ids: Vec<TestCaseId>,
    /// Bumped on every persisted mutation; used for optimistic writes.
    #[serde(default)]
    pub version: u64,
}

impl Suite {
    pub fn contains(&self, test_case_id: &str) -> bool {
        self.test_case_ids.iter().any(|id| id == test_case_id)
    }

    /// Position of a test case within the suite ordering.
    pub fn position(&self, test_case_id: &str) -> Option<usize> {
        self.test_case_ids.iter().position(|id| id == test_case_id)
    }
}

/// A named device/setup profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}
