use crate::model::{PrerequisiteKind, TestCase};
use crate::store::ProfileLookup;
use crate::validate::{IssueType, ValidationIssue, ValidationResult};

/// Check one test case in isolation.
///
/// Only local structure is inspected: action lists must be non-empty, a test
/// may not depend on itself, and every referenced setup profile must exist.
/// Disabled prerequisites are checked too. Dependency targets are not
/// resolved and no cycle detection runs.
pub fn validate_test_case(test_case: &TestCase, profiles: &dyn ProfileLookup) -> ValidationResult {
    let issues = local_issues(test_case, profiles);
    tracing::debug!(
        test_case = %test_case.id,
        issues = issues.len(),
        "test case validated"
    );
    ValidationResult::from_issues(issues)
}

pub(crate) fn local_issues(test_case: &TestCase, profiles: &dyn ProfileLookup) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for prereq in &test_case.prerequisites {
        match &prereq.kind {
            PrerequisiteKind::SetupProfile { setup_profile_id } => {
                if profiles.setup_profile(setup_profile_id).is_none() {
                    issues.push(ValidationIssue::error(
                        IssueType::MissingSetupProfile,
                        format!(
                            "test case '{}' prerequisite '{}' references unknown setup profile '{}'",
                            test_case.id,
                            prereq.label(),
                            setup_profile_id
                        ),
                        vec![test_case.id.clone()],
                    ));
                }
            }
            PrerequisiteKind::TestDependency { test_case_id, .. } => {
                if *test_case_id == test_case.id {
                    issues.push(ValidationIssue::error(
                        IssueType::SelfDependency,
                        format!(
                            "test case '{}' depends on itself through prerequisite '{}'",
                            test_case.id,
                            prereq.label()
                        ),
                        vec![test_case.id.clone()],
                    ));
                }
            }
            PrerequisiteKind::StateSetup { actions } | PrerequisiteKind::Cleanup { actions, .. } => {
                if actions.is_empty() {
                    issues.push(ValidationIssue::error(
                        IssueType::EmptyActions,
                        format!(
                            "test case '{}' {} prerequisite '{}' has no actions",
                            test_case.id,
                            prereq.kind.kind_name(),
                            prereq.label()
                        ),
                        vec![test_case.id.clone()],
                    ));
                }
            }
        }
    }

    issues
}
