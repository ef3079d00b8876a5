//! Shared builders for unit tests.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, PoisonError};

use proptest::prelude::*;

use crate::model::{
    Action, ActionKind, Prerequisite, PrerequisiteKind, SetupProfile, Suite, TestCase,
};
use crate::runner::{ExecError, TestExecutor};
use crate::store::{InMemoryStore, Workspace};

#[derive(Default)]
pub(crate) struct WorkspaceBuilder {
    workspace: Workspace,
}

impl WorkspaceBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn suite(mut self, id: &str, members: &[&str]) -> Self {
        self.workspace.suites.push(Suite {
            id: id.into(),
            name: format!("Suite {id}"),
            test_case_ids: members.iter().map(|m| (*m).to_owned()).collect(),
            version: 0,
        });
        self
    }

    pub(crate) fn test(mut self, id: &str, suite: &str, prerequisites: Vec<Prerequisite>) -> Self {
        self.workspace.test_cases.push(TestCase {
            id: id.into(),
            name: format!("Test {id}"),
            suite_id: suite.into(),
            enabled: true,
            prerequisites,
        });
        self
    }

    pub(crate) fn disabled_test(mut self, id: &str, suite: &str) -> Self {
        self = self.test(id, suite, vec![]);
        if let Some(tc) = self.workspace.test_cases.last_mut() {
            tc.enabled = false;
        }
        self
    }

    pub(crate) fn profile(mut self, id: &str, enabled: bool) -> Self {
        self.workspace.setup_profiles.push(SetupProfile {
            id: id.into(),
            name: format!("Profile {id}"),
            enabled,
        });
        self
    }

    pub(crate) fn into_store(self) -> InMemoryStore {
        InMemoryStore::new(self.workspace)
    }
}

/// Dependency edges `(dependent, prerequisite)` between tests `t0..tN`.
pub(crate) type Edges = BTreeSet<(usize, usize)>;

/// A random acyclic suite: a shuffled suite order over `n` tests plus edges
/// that always point from a higher index to a lower one.
pub(crate) fn random_dag(max_tests: usize) -> impl Strategy<Value = (Vec<usize>, Edges)> {
    (1..=max_tests).prop_flat_map(|n| {
        (
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            prop::collection::vec((0..n, 0..n), 0..=n * 2),
        )
            .prop_map(|(order, pairs)| {
                let edges = pairs
                    .into_iter()
                    .filter(|(a, b)| a != b)
                    .map(|(a, b)| (a.max(b), a.min(b)))
                    .collect();
                (order, edges)
            })
    })
}

/// Store with one suite `S` listing `t{i}` in `order`, wired by `edges`.
pub(crate) fn suite_from_edges(order: &[usize], edges: &Edges) -> InMemoryStore {
    let ids: Vec<String> = order.iter().map(|i| format!("t{i}")).collect();
    let members: Vec<&str> = ids.iter().map(String::as_str).collect();
    let mut builder = WorkspaceBuilder::new().suite("S", &members);
    for &i in order {
        let prerequisites = edges
            .iter()
            .filter(|(from, _)| *from == i)
            .map(|(from, to)| depends_on(&format!("p{from}-{to}"), &format!("t{to}")))
            .collect();
        builder = builder.test(&format!("t{i}"), "S", prerequisites);
    }
    builder.into_store()
}

fn prerequisite(id: &str, kind: PrerequisiteKind) -> Prerequisite {
    Prerequisite {
        id: id.into(),
        name: String::new(),
        enabled: true,
        kind,
    }
}

pub(crate) fn depends_on(id: &str, target: &str) -> Prerequisite {
    prerequisite(
        id,
        PrerequisiteKind::TestDependency {
            test_case_id: target.into(),
            use_cache: false,
            cache_expiry_ms: None,
        },
    )
}

pub(crate) fn cached_dependency(id: &str, target: &str, expiry_ms: u64) -> Prerequisite {
    prerequisite(
        id,
        PrerequisiteKind::TestDependency {
            test_case_id: target.into(),
            use_cache: true,
            cache_expiry_ms: Some(expiry_ms),
        },
    )
}

pub(crate) fn uses_profile(id: &str, profile: &str) -> Prerequisite {
    prerequisite(
        id,
        PrerequisiteKind::SetupProfile {
            setup_profile_id: profile.into(),
        },
    )
}

pub(crate) fn state_setup(id: &str, commands: &[&str]) -> Prerequisite {
    prerequisite(
        id,
        PrerequisiteKind::StateSetup {
            actions: commands.iter().map(|c| shell(c)).collect(),
        },
    )
}

pub(crate) fn cleanup(id: &str, commands: &[&str], always_run: bool) -> Prerequisite {
    prerequisite(
        id,
        PrerequisiteKind::Cleanup {
            actions: commands.iter().map(|c| shell(c)).collect(),
            always_run,
        },
    )
}

pub(crate) fn disabled(mut prereq: Prerequisite) -> Prerequisite {
    prereq.enabled = false;
    prereq
}

pub(crate) fn shell(command: &str) -> Action {
    Action {
        kind: ActionKind::Shell,
        command: command.into(),
        params: Default::default(),
    }
}

/// Executor that records every call and fails on demand.
#[derive(Default)]
pub(crate) struct RecordingExecutor {
    failing_tests: HashSet<String>,
    failing_profiles: HashSet<String>,
    failing_actions: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub(crate) fn failing_test(mut self, id: &str) -> Self {
        self.failing_tests.insert(id.into());
        self
    }

    pub(crate) fn failing_profile(mut self, id: &str) -> Self {
        self.failing_profiles.insert(id.into());
        self
    }

    pub(crate) fn failing_action(mut self, command: &str) -> Self {
        self.failing_actions.insert(command.into());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn tests_run(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix("test ").map(str::to_owned))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl TestExecutor for RecordingExecutor {
    fn apply_setup_profile(&self, profile_id: &str) -> Result<(), ExecError> {
        self.record(format!("profile {profile_id}"));
        if self.failing_profiles.contains(profile_id) {
            return Err(ExecError::Profile {
                profile_id: profile_id.into(),
                message: "device offline".into(),
            });
        }
        Ok(())
    }

    fn run_actions(&self, test_case_id: &str, actions: &[Action]) -> Result<(), ExecError> {
        let commands: Vec<&str> = actions.iter().map(|a| a.command.as_str()).collect();
        self.record(format!("actions {test_case_id} {}", commands.join(", ")));
        match commands.iter().find(|c| self.failing_actions.contains(**c)) {
            Some(command) => Err(ExecError::Action {
                command: (*command).to_owned(),
                message: "exit status 1".into(),
            }),
            None => Ok(()),
        }
    }

    fn run_test(&self, test_case_id: &str) -> Result<(), ExecError> {
        self.record(format!("test {test_case_id}"));
        if self.failing_tests.contains(test_case_id) {
            return Err(ExecError::Failed(format!("{test_case_id} assertion failed")));
        }
        Ok(())
    }
}
