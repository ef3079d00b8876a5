use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TestCaseId;

/// Default cache window for a cacheable test dependency (five minutes).
///
/// Engine config may override it for dependencies that set no expiry.
pub const DEFAULT_CACHE_EXPIRY_MS: u64 = 300_000;

/// A precondition attached to a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: PrerequisiteKind,
}

/// The four prerequisite kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrerequisiteKind {
    /// A device/setup profile applied before the test runs.
    SetupProfile { setup_profile_id: String },
    /// Another test case that must complete successfully first.
    TestDependency {
        test_case_id: TestCaseId,
        #[serde(default)]
        use_cache: bool,
        /// Falls back to the engine's default expiry when unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cache_expiry_ms: Option<u64>,
    },
    /// Actions executed before the test body.
    StateSetup { actions: Vec<Action> },
    /// Actions executed after the test body.
    Cleanup {
        actions: Vec<Action>,
        /// When `false` the actions only fire if the test failed.
        #[serde(default)]
        always_run: bool,
    },
}

impl Prerequisite {
    /// The referenced test case id, for `TestDependency` prerequisites.
    pub fn dependency_target(&self) -> Option<&str> {
        match &self.kind {
            PrerequisiteKind::TestDependency { test_case_id, .. } => Some(test_case_id),
            _ => None,
        }
    }

    /// The action list for `StateSetup` and `Cleanup` prerequisites.
    pub fn actions(&self) -> Option<&[Action]> {
        match &self.kind {
            PrerequisiteKind::StateSetup { actions } | PrerequisiteKind::Cleanup { actions, .. } => {
                Some(actions)
            }
            PrerequisiteKind::SetupProfile { .. } | PrerequisiteKind::TestDependency { .. } => None,
        }
    }

    /// Display label: the name if set, otherwise the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl PrerequisiteKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::SetupProfile { .. } => "setup_profile",
            Self::TestDependency { .. } => "test_dependency",
            Self::StateSetup { .. } => "state_setup",
            Self::Cleanup { .. } => "cleanup",
        }
    }
}

/// A single device, custom or shell action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Device,
    Custom,
    Shell,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device => write!(f, "device"),
            Self::Custom => write!(f, "custom"),
            Self::Shell => write!(f, "shell"),
        }
    }
}

pub(crate) fn enabled_by_default() -> bool {
    true
}
