use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::cache::{CachedResult, ResolutionSource};
use crate::model::{SuiteId, TestCaseId};

/// The outcome of one test in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// How an external dependency was satisfied before a step ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyOutcome {
    pub test_case_id: TestCaseId,
    pub result: CachedResult,
    pub source: ResolutionSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub test_case_id: TestCaseId,
    pub status: StepStatus,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyOutcome>,
    /// Cleanup failures never change the status; they are only reported.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cleanup_errors: Vec<String>,
}

impl StepResult {
    pub fn new(test_case_id: &str, status: StepStatus, duration: Duration) -> Self {
        Self {
            test_case_id: test_case_id.to_owned(),
            status,
            duration,
            message: None,
            dependencies: Vec::new(),
            cleanup_errors: Vec::new(),
        }
    }

    /// Create a skipped result with zero duration.
    pub fn skipped(test_case_id: &str, reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::new(test_case_id, StepStatus::Skipped, Duration::ZERO)
        }
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// Summary statistics for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunSummary {
    /// Whether the run was fully successful (no failures or errors).
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }

    pub fn from_results(results: &[StepResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            passed: 0,
            failed: 0,
            skipped: 0,
            errors: 0,
        };
        for r in results {
            match r.status {
                StepStatus::Passed => summary.passed += 1,
                StepStatus::Failed => summary.failed += 1,
                StepStatus::Skipped => summary.skipped += 1,
                StepStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuiteRunResult {
    pub suite_id: SuiteId,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub total_duration: Duration,
    pub steps: Vec<StepResult>,
    pub summary: RunSummary,
}

impl SuiteRunResult {
    pub fn step(&self, test_case_id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.test_case_id == test_case_id)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
