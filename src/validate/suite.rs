use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use serde_json::json;

use crate::graph::analysis::find_cycles;
use crate::graph::builder::{DependencyGraph, NodeState, build};
use crate::model::{PrerequisiteKind, Suite, TestCaseId};
use crate::plan::{PlanError, execution_order};
use crate::store::{ProfileLookup, SuiteStore};
use crate::validate::test_case::local_issues;
use crate::validate::{IssueType, SuggestedFix, SuggestedFixType, ValidationIssue, ValidationResult};

/// Validate a whole suite.
///
/// Builds the dependency graph and reports, in this order: unknown members,
/// member-local problems, cycles, missing or cross-suite dependencies,
/// disabled blockers and, when nothing blocks planning, a suite order that
/// contradicts the dependencies. The execution order is attached only when
/// no error was found.
pub fn validate_suite(
    suite: &Suite,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> ValidationResult {
    let dg = build(suite, store);
    validate_graph(suite, &dg, store, profiles)
}

/// Validate a suite whose graph has already been built.
pub fn validate_graph(
    suite: &Suite,
    dg: &DependencyGraph,
    store: &dyn SuiteStore,
    profiles: &dyn ProfileLookup,
) -> ValidationResult {
    let mut issues = Vec::new();

    check_members(suite, dg, profiles, &mut issues);
    check_cycles(dg, &mut issues);
    check_missing(suite, dg, store, &mut issues);
    check_disabled(dg, profiles, &mut issues);

    let mut result = ValidationResult::from_issues(issues);
    if result.valid {
        match execution_order(dg) {
            Ok(order) => {
                if let Some(issue) = order_mismatch(dg, &order) {
                    result.issues.push(issue);
                }
                result.execution_order = Some(order);
            }
            Err(PlanError::CycleDetected { cycle, .. }) => {
                result.issues.push(cycle_issue(cycle));
                result.valid = false;
            }
            Err(err) => {
                tracing::warn!(suite = %suite.id, error = %err, "ordering failed");
                result.valid = false;
            }
        }
    }

    tracing::debug!(
        suite = %suite.id,
        valid = result.valid,
        errors = result.errors().count(),
        warnings = result.warnings().count(),
        "suite validated"
    );
    result
}

fn check_members(
    suite: &Suite,
    dg: &DependencyGraph,
    profiles: &dyn ProfileLookup,
    issues: &mut Vec<ValidationIssue>,
) {
    for &idx in &dg.members {
        let node = &dg.graph[idx];
        match dg.test_case(&node.id) {
            Some(test_case) => issues.extend(local_issues(test_case, profiles)),
            None => issues.push(ValidationIssue::error(
                IssueType::MissingTestCase,
                format!(
                    "suite '{}' lists test case '{}' which does not exist",
                    suite.id, node.id
                ),
                vec![node.id.clone()],
            )),
        }
    }
}

fn check_cycles(dg: &DependencyGraph, issues: &mut Vec<ValidationIssue>) {
    issues.extend(find_cycles(dg).into_iter().map(cycle_issue));
}

fn cycle_issue(cycle: Vec<TestCaseId>) -> ValidationIssue {
    ValidationIssue::error(
        IssueType::CyclicDependency,
        format!("circular dependency: {}", cycle.join(" -> ")),
        cycle,
    )
}

/// Group member dependencies on non-members by target, in discovery order.
///
/// Adding a target is auto-applicable only when some existing suite already
/// owns or lists it.
fn check_missing(
    suite: &Suite,
    dg: &DependencyGraph,
    store: &dyn SuiteStore,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut slots: HashMap<NodeIndex, usize> = HashMap::new();
    let mut groups: Vec<(NodeIndex, Vec<TestCaseId>)> = Vec::new();

    for &member in &dg.members {
        for target in dg.dependencies_of(member) {
            let node = &dg.graph[target];
            if node.is_member() {
                continue;
            }
            let slot = *slots.entry(target).or_insert_with(|| {
                groups.push((target, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(dg.graph[member].id.clone());
        }
    }

    for (target, dependents) in groups {
        let node = &dg.graph[target];
        let mut affected = dependents.clone();
        affected.push(node.id.clone());

        let issue = match &node.state {
            NodeState::Phantom => ValidationIssue::error(
                IssueType::MissingDependency,
                format!(
                    "{} depends on '{}' which does not exist",
                    quote_list(&dependents),
                    node.id
                ),
                affected,
            )
            .with_fix(SuggestedFix {
                fix_type: SuggestedFixType::AddToSuite,
                description: format!("create test case '{}' first", node.id),
                auto_applicable: false,
                data: None,
            }),
            NodeState::Resolved {
                suite_id: owner, ..
            } => {
                let containing = store.suites_containing(&node.id);
                let home = if containing.contains(owner) {
                    Some(owner.clone())
                } else {
                    containing.into_iter().find(|id| *id != suite.id)
                };
                let location = match &home {
                    Some(home) if *home == suite.id => {
                        format!("is not listed in suite '{}'", suite.id)
                    }
                    Some(home) => format!("belongs to suite '{home}', not '{}'", suite.id),
                    None => format!("belongs to suite '{owner}', which does not exist"),
                };
                let fix = match home {
                    Some(home) => SuggestedFix {
                        fix_type: SuggestedFixType::AddToSuite,
                        description: format!("add '{}' to suite '{}'", node.id, suite.id),
                        auto_applicable: true,
                        data: Some(json!({
                            "suite_id": suite.id,
                            "test_case_id": node.id,
                            "owner_suite_id": home,
                        })),
                    },
                    None => SuggestedFix {
                        fix_type: SuggestedFixType::AddToSuite,
                        description: format!(
                            "assign '{}' to an existing suite before adding it to '{}'",
                            node.id, suite.id
                        ),
                        auto_applicable: false,
                        data: None,
                    },
                };
                ValidationIssue::error(
                    IssueType::MissingDependency,
                    format!(
                        "{} depends on '{}' which {location}",
                        quote_list(&dependents),
                        node.id
                    ),
                    affected,
                )
                .with_fix(fix)
            }
        };
        issues.push(issue);
    }
}

/// Warn when an enabled member needs something that is switched off.
fn check_disabled(
    dg: &DependencyGraph,
    profiles: &dyn ProfileLookup,
    issues: &mut Vec<ValidationIssue>,
) {
    for &member in &dg.members {
        let node = &dg.graph[member];
        if !node.is_enabled() {
            continue;
        }
        let Some(test_case) = dg.test_case(&node.id) else {
            continue;
        };

        for prereq in test_case.prerequisites.iter().filter(|p| p.enabled) {
            match &prereq.kind {
                PrerequisiteKind::TestDependency { test_case_id, .. } => {
                    let disabled = dg
                        .node(test_case_id)
                        .is_some_and(|n| !n.is_phantom() && !n.is_enabled());
                    if disabled {
                        issues.push(ValidationIssue::warning(
                            IssueType::DisabledPrerequisite,
                            format!(
                                "test case '{}' depends on disabled test case '{}'",
                                node.id, test_case_id
                            ),
                            vec![node.id.clone(), test_case_id.clone()],
                        ));
                    }
                }
                PrerequisiteKind::SetupProfile { setup_profile_id } => {
                    let disabled = profiles
                        .setup_profile(setup_profile_id)
                        .is_some_and(|p| !p.enabled);
                    if disabled {
                        issues.push(ValidationIssue::warning(
                            IssueType::DisabledPrerequisite,
                            format!(
                                "test case '{}' requires disabled setup profile '{}'",
                                node.id, setup_profile_id
                            ),
                            vec![node.id.clone()],
                        ));
                    }
                }
                PrerequisiteKind::StateSetup { .. } | PrerequisiteKind::Cleanup { .. } => {}
            }
        }
    }
}

/// Report member edges whose prerequisite is listed after its dependent.
fn order_mismatch(dg: &DependencyGraph, order: &[TestCaseId]) -> Option<ValidationIssue> {
    let slot_of: HashMap<NodeIndex, usize> = dg
        .members
        .iter()
        .enumerate()
        .map(|(slot, &idx)| (idx, slot))
        .collect();

    let mut affected: Vec<TestCaseId> = Vec::new();
    let mut violations = 0usize;
    for &member in &dg.members {
        for dep in dg.dependencies_of(member) {
            let Some(&dep_slot) = slot_of.get(&dep) else {
                continue;
            };
            if dep_slot > slot_of[&member] {
                violations += 1;
                for id in [&dg.graph[member].id, &dg.graph[dep].id] {
                    if !affected.contains(id) {
                        affected.push(id.clone());
                    }
                }
            }
        }
    }

    if violations == 0 {
        return None;
    }

    Some(
        ValidationIssue::warning(
            IssueType::ExecutionOrderMismatch,
            format!(
                "suite order runs {violations} test(s) before their prerequisites; planned order is {}",
                order.join(", ")
            ),
            affected,
        )
        .with_fix(SuggestedFix {
            fix_type: SuggestedFixType::Reorder,
            description: "reorder the suite to follow its dependencies".into(),
            auto_applicable: true,
            data: Some(json!({ "execution_order": order })),
        }),
    )
}

fn quote_list(ids: &[TestCaseId]) -> String {
    ids.iter()
        .map(|id| format!("'{id}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
