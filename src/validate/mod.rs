//! Structural validation of test cases and suites.

mod suite;
mod test_case;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::TestCaseId;

pub use suite::{validate_graph, validate_suite};
pub use test_case::validate_test_case;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    CyclicDependency,
    MissingDependency,
    DisabledPrerequisite,
    SelfDependency,
    EmptyActions,
    MissingSetupProfile,
    MissingTestCase,
    ExecutionOrderMismatch,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CyclicDependency => "cyclic_dependency",
            Self::MissingDependency => "missing_dependency",
            Self::DisabledPrerequisite => "disabled_prerequisite",
            Self::SelfDependency => "self_dependency",
            Self::EmptyActions => "empty_actions",
            Self::MissingSetupProfile => "missing_setup_profile",
            Self::MissingTestCase => "missing_test_case",
            Self::ExecutionOrderMismatch => "execution_order_mismatch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedFixType {
    /// Append the referenced test to the suite.
    AddToSuite,
    /// Reorder the suite to the planned execution order.
    Reorder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedFix {
    #[serde(rename = "type")]
    pub fix_type: SuggestedFixType,
    pub description: String,
    pub auto_applicable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    pub affected_test_case_ids: Vec<TestCaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<SuggestedFix>,
}

impl ValidationIssue {
    pub fn error(issue_type: IssueType, message: impl Into<String>, affected: Vec<TestCaseId>) -> Self {
        Self {
            issue_type,
            severity: Severity::Error,
            message: message.into(),
            affected_test_case_ids: affected,
            suggested_fix: None,
        }
    }

    pub fn warning(
        issue_type: IssueType,
        message: impl Into<String>,
        affected: Vec<TestCaseId>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(issue_type, message, affected)
        }
    }

    pub fn with_fix(mut self, fix: SuggestedFix) -> Self {
        self.suggested_fix = Some(fix);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Whether the auto-fix engine may apply this issue's fix.
    pub fn auto_fix(&self) -> Option<&SuggestedFix> {
        self.suggested_fix.as_ref().filter(|f| f.auto_applicable)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.issue_type, self.message)
    }
}

/// Outcome of validating a test case or a suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    /// Present only when no error-severity issue was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_order: Option<Vec<TestCaseId>>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            valid: !issues.iter().any(ValidationIssue::is_error),
            issues,
            execution_order: None,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    pub fn issues_of(&self, issue_type: IssueType) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.issue_type == issue_type)
    }
}
