pub mod compiler;
pub mod order;
pub mod types;

use thiserror::Error;

use crate::model::{SuiteId, TestCaseId};
use crate::store::StoreError;

pub use compiler::compile;
pub use order::execution_order;
pub use types::ExecutionPlan;

/// Errors raised while planning a suite.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The suite's dependencies form a cycle; `cycle` is a closed path.
    #[error("cycle detected in suite '{suite_id}': {path}", path = .cycle.join(" -> "))]
    CycleDetected {
        suite_id: SuiteId,
        cycle: Vec<TestCaseId>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
