//! Reversible suite mutations derived from validation issues.
//!
//! A fix is computed against a suite snapshot, written back with one
//! version-guarded update and then re-validated. Nothing is written when the
//! suite changed in between.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Suite, SuiteId, TestCaseId};
use crate::store::{ProfileLookup, StoreError, SuiteStore};
use crate::validate::{IssueType, SuggestedFixType, ValidationIssue, ValidationResult, validate_suite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    /// Append auto-fixable missing dependencies to the suite.
    AddMissing,
    /// Rewrite the suite ordering to the planned execution order.
    Reorder,
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddMissing => write!(f, "add-missing"),
            Self::Reorder => write!(f, "reorder"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("no applicable {kind} fix for suite '{suite_id}'")]
    NoApplicableFix { suite_id: SuiteId, kind: FixKind },

    #[error("suite '{suite_id}' cannot be ordered: {count} unresolved error(s)", count = .issues.len())]
    UnresolvedErrors {
        suite_id: SuiteId,
        issues: Vec<ValidationIssue>,
    },

    #[error("suite '{suite_id}' was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        suite_id: SuiteId,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for FixError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict {
                suite_id,
                expected,
                actual,
            } => FixError::ConcurrentModification {
                suite_id,
                expected,
                actual,
            },
            other => FixError::Store(other),
        }
    }
}

/// A computed but not yet written fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixProposal {
    pub kind: FixKind,
    /// The suite snapshot the fix was computed against.
    pub previous: Suite,
    pub test_case_ids: Vec<TestCaseId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<TestCaseId>,
}

/// The result of an applied fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixOutcome {
    pub kind: FixKind,
    pub previous: Suite,
    pub suite: Suite,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<TestCaseId>,
    pub revalidation: ValidationResult,
}

/// Compute a fix without writing anything.
///
/// # Errors
///
/// - [`StoreError::SuiteNotFound`] for unknown suites.
/// - [`FixError::UnresolvedErrors`] when reordering a suite that has no
///   execution order.
/// - [`FixError::NoApplicableFix`] when the fix would change nothing.
pub fn propose(
    suite_id: &str,
    kind: FixKind,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> Result<FixProposal, FixError> {
    let previous = store
        .suite(suite_id)
        .ok_or_else(|| StoreError::SuiteNotFound(suite_id.to_owned()))?;

    let proposal = match kind {
        FixKind::AddMissing => propose_add_missing(previous, store, profiles),
        FixKind::Reorder => propose_reorder(previous, store, profiles)?,
    };

    if proposal.test_case_ids == proposal.previous.test_case_ids {
        return Err(FixError::NoApplicableFix {
            suite_id: suite_id.to_owned(),
            kind,
        });
    }
    Ok(proposal)
}

/// Write a proposal back and re-validate the suite.
///
/// # Errors
///
/// Returns [`FixError::ConcurrentModification`] if the suite changed after
/// the proposal was computed; nothing is written in that case.
pub fn apply(
    proposal: FixProposal,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> Result<FixOutcome, FixError> {
    let suite = store.update_suite(
        &proposal.previous.id,
        proposal.test_case_ids,
        proposal.previous.version,
    )?;
    let revalidation = validate_suite(&suite, store, profiles);

    tracing::info!(
        suite = %suite.id,
        kind = %proposal.kind,
        added = proposal.added.len(),
        version = suite.version,
        valid = revalidation.valid,
        "fix applied"
    );

    Ok(FixOutcome {
        kind: proposal.kind,
        previous: proposal.previous,
        suite,
        added: proposal.added,
        revalidation,
    })
}

/// Compute and apply a fix in one step.
///
/// # Errors
///
/// See [`propose`] and [`apply`].
pub fn auto_fix(
    suite_id: &str,
    kind: FixKind,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> Result<FixOutcome, FixError> {
    let proposal = propose(suite_id, kind, store, profiles)?;
    apply(proposal, store, profiles)
}

/// Restore the ordering a fix replaced.
///
/// # Errors
///
/// Returns [`FixError::ConcurrentModification`] if the suite changed after
/// the fix was applied.
pub fn revert_fix(outcome: &FixOutcome, store: &dyn SuiteStore) -> Result<Suite, FixError> {
    let suite = store.update_suite(
        &outcome.suite.id,
        outcome.previous.test_case_ids.clone(),
        outcome.suite.version,
    )?;
    tracing::info!(suite = %suite.id, kind = %outcome.kind, "fix reverted");
    Ok(suite)
}

/// Add ids until validation stops offering new ones, so dependencies of
/// freshly added tests are pulled in by the same fix.
fn propose_add_missing(
    previous: Suite,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> FixProposal {
    let mut working = previous.clone();
    let mut added = Vec::new();

    loop {
        let result = validate_suite(&working, store, profiles);
        let fresh: Vec<TestCaseId> = addable_ids(&result)
            .filter(|id| !working.contains(id))
            .collect();
        if fresh.is_empty() {
            break;
        }
        for id in fresh {
            if !working.contains(&id) {
                working.test_case_ids.push(id.clone());
                added.push(id);
            }
        }
    }

    FixProposal {
        kind: FixKind::AddMissing,
        previous,
        test_case_ids: working.test_case_ids,
        added,
    }
}

fn propose_reorder(
    previous: Suite,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> Result<FixProposal, FixError> {
    let result = validate_suite(&previous, store, profiles);
    let Some(order) = result.execution_order else {
        return Err(FixError::UnresolvedErrors {
            suite_id: previous.id.clone(),
            issues: result.issues.into_iter().filter(|i| i.is_error()).collect(),
        });
    };

    Ok(FixProposal {
        kind: FixKind::Reorder,
        previous,
        test_case_ids: order,
        added: Vec::new(),
    })
}

fn addable_ids(result: &ValidationResult) -> impl Iterator<Item = TestCaseId> + '_ {
    result
        .issues_of(IssueType::MissingDependency)
        .filter_map(|issue| issue.auto_fix())
        .filter(|fix| fix.fix_type == SuggestedFixType::AddToSuite)
        .filter_map(|fix| fix.data.as_ref()?.get("test_case_id")?.as_str())
        .map(str::to_owned)
}
