use thiserror::Error;

use crate::model::Action;

/// The device-facing side of a run.
///
/// The runner decides what runs and when; implementations decide how. A
/// failing test is reported as [`ExecError::Failed`]; every other variant
/// means the infrastructure could not do its job.
pub trait TestExecutor: Send + Sync {
    /// Apply a named setup profile before a test.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Profile`] if the profile could not be applied.
    fn apply_setup_profile(&self, profile_id: &str) -> Result<(), ExecError>;

    /// Run an ordered list of state-setup or cleanup actions.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Action`] for the first action that failed.
    fn run_actions(&self, test_case_id: &str, actions: &[Action]) -> Result<(), ExecError>;

    /// Run the body of a test.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Failed`] when the test ran and failed.
    fn run_test(&self, test_case_id: &str) -> Result<(), ExecError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("test failed: {0}")]
    Failed(String),

    #[error("action '{command}' failed: {message}")]
    Action { command: String, message: String },

    #[error("setup profile '{profile_id}' could not be applied: {message}")]
    Profile { profile_id: String, message: String },

    #[error("executor unavailable: {0}")]
    Unavailable(String),
}

impl ExecError {
    /// Whether the test itself failed, as opposed to the infrastructure.
    pub fn is_test_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
