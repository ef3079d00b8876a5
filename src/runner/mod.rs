//! Reference test runner driving compiled execution plans.

pub mod backend;
pub mod executor;
pub mod result;

use thiserror::Error;

use crate::plan::PlanError;
use crate::store::StoreError;

pub use backend::{ExecError, TestExecutor};
pub use executor::SuiteRunner;
pub use result::{RunSummary, StepResult, StepStatus, SuiteRunResult};

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
