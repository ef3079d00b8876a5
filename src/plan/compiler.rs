use std::collections::HashMap;

use petgraph::graph::NodeIndex;

use crate::cache::PrerequisiteCache;
use crate::graph::builder::DependencyGraph;
use crate::model::{PrerequisiteKind, Suite};
use crate::plan::PlanError;
use crate::plan::order::{levels, ordered_externals, ordered_members};
use crate::plan::types::{
    ActionBlock, CleanupBlock, DependencyHint, ExecutionPlan, PlanMetadata, PlanStep,
};

/// Compile a suite's dependency graph into an execution plan.
///
/// Steps follow [`execution_order`](crate::plan::order::execution_order).
/// Tests from other suites that the members need, directly or transitively,
/// are compiled into `external_steps` in dependency order so a runner can
/// satisfy each one with its own profiles, setup and dependencies.
/// Disabled prerequisites still shape the order but are left out of the
/// runnable lists, `depends_on` included; cacheable
/// dependencies carry a hint telling whether a fresh result is cached now.
///
/// # Errors
///
/// Returns [`PlanError::CycleDetected`] if the suite, or the outside tests
/// it needs, cannot be ordered.
pub fn compile(
    suite: &Suite,
    dg: &DependencyGraph,
    cache: &PrerequisiteCache,
) -> Result<ExecutionPlan, PlanError> {
    let order = ordered_members(dg)?;
    let levels_by_node = levels(dg, &order);
    let steps: Vec<PlanStep> = order
        .iter()
        .enumerate()
        .map(|(position, &idx)| compile_step(dg, idx, position, &levels_by_node, cache))
        .collect();

    let externals = ordered_externals(dg)?;
    let external_levels = levels(dg, &externals);
    let external_steps: Vec<PlanStep> = externals
        .iter()
        .filter(|&&idx| !dg.graph[idx].is_phantom())
        .enumerate()
        .map(|(position, &idx)| compile_step(dg, idx, position, &external_levels, cache))
        .collect();
    let external_tests = externals
        .iter()
        .map(|&idx| dg.graph[idx].id.clone())
        .collect();

    let levels_total = levels_by_node.values().max().map_or(0, |deepest| deepest + 1);

    Ok(ExecutionPlan {
        plan: PlanMetadata {
            suite_id: suite.id.clone(),
            name: suite.name.clone(),
            tests_total: steps.len(),
            edges_total: dg.graph.edge_count(),
            levels_total,
            external_tests,
        },
        external_steps,
        steps,
    })
}

fn compile_step(
    dg: &DependencyGraph,
    idx: NodeIndex,
    position: usize,
    levels: &HashMap<NodeIndex, usize>,
    cache: &PrerequisiteCache,
) -> PlanStep {
    let node = &dg.graph[idx];

    let mut depends_on: Vec<String> = Vec::new();
    let mut dependencies = Vec::new();
    let mut setup_profiles = Vec::new();
    let mut state_setup = Vec::new();
    let mut cleanup = Vec::new();

    let prerequisites = dg
        .test_case(&node.id)
        .map(|tc| tc.prerequisites.as_slice())
        .unwrap_or_default();

    for prereq in prerequisites.iter().filter(|p| p.enabled) {
        match &prereq.kind {
            PrerequisiteKind::SetupProfile { setup_profile_id } => {
                setup_profiles.push(setup_profile_id.clone());
            }
            PrerequisiteKind::TestDependency {
                test_case_id,
                use_cache,
                cache_expiry_ms,
            } => {
                let in_suite = dg.node(test_case_id).is_some_and(|n| n.is_member());
                if in_suite && !depends_on.contains(test_case_id) {
                    depends_on.push(test_case_id.clone());
                }
                dependencies.push(DependencyHint {
                    prerequisite_id: prereq.id.clone(),
                    test_case_id: test_case_id.clone(),
                    in_suite,
                    use_cache: *use_cache,
                    cache_expiry_ms: cache_expiry_ms.unwrap_or_else(|| cache.default_expiry_ms()),
                    cached: *use_cache && cache.is_fresh(test_case_id),
                });
            }
            PrerequisiteKind::StateSetup { actions } => state_setup.push(ActionBlock {
                prerequisite_id: prereq.id.clone(),
                actions: actions.clone(),
            }),
            PrerequisiteKind::Cleanup {
                actions,
                always_run,
            } => cleanup.push(CleanupBlock {
                prerequisite_id: prereq.id.clone(),
                always_run: *always_run,
                actions: actions.clone(),
            }),
        }
    }

    PlanStep {
        order: position + 1,
        test_case_id: node.id.clone(),
        name: node.name.clone().unwrap_or_default(),
        enabled: node.is_enabled(),
        level: levels.get(&idx).copied().unwrap_or_default(),
        depends_on,
        dependencies,
        setup_profiles,
        state_setup,
        cleanup,
    }
}
