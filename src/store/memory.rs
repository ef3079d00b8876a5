use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{SetupProfile, Suite, SuiteId, TestCase};
use crate::store::{ProfileLookup, StoreError, SuiteStore, Workspace};

/// Thread-safe in-memory store backed by a [`Workspace`].
///
/// Suite writes are serialized by the lock and guarded by the suite version,
/// so a manual edit and an auto-fix racing on the same suite cannot both win.
pub struct InMemoryStore {
    state: RwLock<State>,
}

struct State {
    workspace: Workspace,
    test_index: HashMap<String, usize>,
}

impl State {
    fn new(workspace: Workspace) -> Self {
        let test_index = workspace
            .test_cases
            .iter()
            .enumerate()
            .map(|(i, tc)| (tc.id.clone(), i))
            .collect();
        Self {
            workspace,
            test_index,
        }
    }
}

impl InMemoryStore {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            state: RwLock::new(State::new(workspace)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Workspace> for InMemoryStore {
    fn from(workspace: Workspace) -> Self {
        Self::new(workspace)
    }
}

impl SuiteStore for InMemoryStore {
    fn test_case(&self, id: &str) -> Option<TestCase> {
        let state = self.read();
        state
            .test_index
            .get(id)
            .map(|&i| state.workspace.test_cases[i].clone())
    }

    fn suite(&self, id: &str) -> Option<Suite> {
        self.read()
            .workspace
            .suites
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    fn suites_containing(&self, test_case_id: &str) -> Vec<SuiteId> {
        let state = self.read();
        let owner = state
            .test_index
            .get(test_case_id)
            .map(|&i| state.workspace.test_cases[i].suite_id.as_str());

        state
            .workspace
            .suites
            .iter()
            .filter(|s| owner == Some(s.id.as_str()) || s.contains(test_case_id))
            .map(|s| s.id.clone())
            .collect()
    }

    fn update_suite(
        &self,
        suite_id: &str,
        test_case_ids: Vec<String>,
        expected_version: u64,
    ) -> Result<Suite, StoreError> {
        let mut state = self.write();
        let suite = state
            .workspace
            .suites
            .iter_mut()
            .find(|s| s.id == suite_id)
            .ok_or_else(|| StoreError::SuiteNotFound(suite_id.to_owned()))?;

        if suite.version != expected_version {
            return Err(StoreError::VersionConflict {
                suite_id: suite_id.to_owned(),
                expected: expected_version,
                actual: suite.version,
            });
        }

        suite.test_case_ids = test_case_ids;
        suite.version += 1;
        Ok(suite.clone())
    }
}

impl ProfileLookup for InMemoryStore {
    fn setup_profile(&self, id: &str) -> Option<SetupProfile> {
        self.read()
            .workspace
            .setup_profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{WorkspaceBuilder, depends_on};

    fn store() -> InMemoryStore {
        WorkspaceBuilder::new()
            .suite("S", &["A", "B"])
            .suite("T", &["E"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("E", "T", vec![])
            .profile("phone", true)
            .into_store()
    }

    #[test]
    fn looks_up_test_cases_and_suites() {
        let store = store();
        assert_eq!(store.test_case("B").map(|t| t.suite_id), Some("S".into()));
        assert!(store.test_case("Z").is_none());
        assert_eq!(store.suite("T").map(|s| s.test_case_ids), Some(vec!["E".into()]));
        assert!(store.setup_profile("phone").is_some());
        assert!(store.setup_profile("tablet").is_none());
    }

    #[test]
    fn suites_containing_includes_owner_and_members() {
        let store = store();
        store
            .update_suite("S", vec!["A".into(), "B".into(), "E".into()], 0)
            .expect("update failed");
        let mut suites = store.suites_containing("E");
        suites.sort();
        assert_eq!(suites, vec!["S", "T"]);
        assert!(store.suites_containing("nope").is_empty());
    }

    #[test]
    fn update_suite_bumps_version() {
        let store = store();
        let updated = store
            .update_suite("S", vec!["B".into(), "A".into()], 0)
            .expect("update failed");
        assert_eq!(updated.version, 1);
        assert_eq!(updated.test_case_ids, vec!["B", "A"]);
    }

    #[test]
    fn update_suite_rejects_stale_version() {
        let store = store();
        store.update_suite("S", vec!["A".into()], 0).expect("first write");
        let err = store.update_suite("S", vec!["B".into()], 0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
        assert_eq!(store.suite("S").map(|s| s.test_case_ids), Some(vec!["A".into()]));
    }

    #[test]
    fn update_unknown_suite_fails() {
        let err = store().update_suite("nope", vec![], 0).unwrap_err();
        assert!(matches!(err, StoreError::SuiteNotFound(_)));
    }
}
