//! Storage collaborators consumed by the engine.
//!
//! The engine reads suites and test cases by id and writes suites back only
//! when an auto-fix is applied. Setup profiles are consulted for existence
//! and their enabled flag.

mod error;
pub mod memory;
pub mod workspace;

use crate::model::{SetupProfile, Suite, SuiteId, TestCase};

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use workspace::Workspace;

/// Read/write access to suites and test cases.
pub trait SuiteStore: Send + Sync {
    /// Fetch a test case from any suite.
    fn test_case(&self, id: &str) -> Option<TestCase>;

    /// Fetch a suite snapshot, including its current version.
    fn suite(&self, id: &str) -> Option<Suite>;

    /// Ids of every suite that lists the test case as a member, or owns it.
    fn suites_containing(&self, test_case_id: &str) -> Vec<SuiteId>;

    /// Replace a suite's membership list.
    ///
    /// The write succeeds only if the stored version still equals
    /// `expected_version`; the stored version is then incremented and the
    /// new snapshot returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SuiteNotFound`] for unknown suites and
    /// [`StoreError::VersionConflict`] if the suite changed since it was read.
    fn update_suite(
        &self,
        suite_id: &str,
        test_case_ids: Vec<String>,
        expected_version: u64,
    ) -> Result<Suite, StoreError>;
}

/// Existence check for setup profiles.
pub trait ProfileLookup: Send + Sync {
    fn setup_profile(&self, id: &str) -> Option<SetupProfile>;
}
