use std::collections::{BTreeSet, HashMap, VecDeque};

use petgraph::graph::NodeIndex;

use crate::graph::analysis::find_cycle_among;
use crate::graph::builder::DependencyGraph;
use crate::model::TestCaseId;
use crate::plan::PlanError;

/// Compute the execution order of a suite's members.
///
/// Kahn's algorithm over the member subgraph. Whenever several tests are
/// ready at once, the one earliest in the suite ordering goes first, so
/// unrelated tests keep their relative order between runs. Edges to
/// non-members are treated as satisfied outside the suite.
///
/// # Errors
///
/// Returns [`PlanError::CycleDetected`] if the members contain a cycle; no
/// partial order is returned.
pub fn execution_order(dg: &DependencyGraph) -> Result<Vec<TestCaseId>, PlanError> {
    Ok(ordered_members(dg)?
        .into_iter()
        .map(|idx| dg.graph[idx].id.clone())
        .collect())
}

pub(crate) fn ordered_members(dg: &DependencyGraph) -> Result<Vec<NodeIndex>, PlanError> {
    let slot_of: HashMap<NodeIndex, usize> = dg
        .members
        .iter()
        .enumerate()
        .map(|(slot, &idx)| (idx, slot))
        .collect();

    let mut pending: Vec<usize> = dg
        .members
        .iter()
        .map(|&idx| {
            dg.dependencies_of(idx)
                .iter()
                .filter(|dep| slot_of.contains_key(*dep))
                .count()
        })
        .collect();

    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count == 0)
        .map(|(slot, _)| slot)
        .collect();

    let mut order = Vec::with_capacity(dg.members.len());
    while let Some(slot) = ready.pop_first() {
        let idx = dg.members[slot];
        order.push(idx);
        for dependent in dg.dependents_of(idx) {
            if let Some(&dependent_slot) = slot_of.get(&dependent) {
                pending[dependent_slot] -= 1;
                if pending[dependent_slot] == 0 {
                    ready.insert(dependent_slot);
                }
            }
        }
    }

    if order.len() < dg.members.len() {
        let blocked: Vec<NodeIndex> = dg
            .members
            .iter()
            .zip(&pending)
            .filter(|&(_, &count)| count > 0)
            .map(|(&idx, _)| idx)
            .collect();
        let cycle = find_cycle_among(dg, &blocked)
            .unwrap_or_else(|| blocked.iter().map(|&i| dg.graph[i].id.clone()).collect());
        tracing::debug!(suite = %dg.suite_id, cycle = ?cycle, "refusing to order cyclic suite");
        return Err(PlanError::CycleDetected {
            suite_id: dg.suite_id.clone(),
            cycle,
        });
    }

    Ok(order)
}

/// Tests outside the suite that members need through enabled
/// `TestDependency` prerequisites, directly or through another outside test,
/// in dependency order. Ties keep discovery order.
///
/// # Errors
///
/// Returns [`PlanError::CycleDetected`] if those tests depend on each other
/// in a cycle.
pub(crate) fn ordered_externals(dg: &DependencyGraph) -> Result<Vec<NodeIndex>, PlanError> {
    let mut closure: Vec<NodeIndex> = Vec::new();
    let mut slot_of: HashMap<NodeIndex, usize> = HashMap::new();
    let mut queue: VecDeque<NodeIndex> = dg.members.iter().copied().collect();
    while let Some(idx) = queue.pop_front() {
        for dep in dg.enabled_dependencies_of(idx) {
            if dg.graph[dep].is_member() || slot_of.contains_key(&dep) {
                continue;
            }
            slot_of.insert(dep, closure.len());
            closure.push(dep);
            queue.push_back(dep);
        }
    }

    let mut pending = vec![0usize; closure.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); closure.len()];
    for (slot, &idx) in closure.iter().enumerate() {
        for dep in dg.enabled_dependencies_of(idx) {
            if let Some(&dep_slot) = slot_of.get(&dep) {
                pending[slot] += 1;
                dependents[dep_slot].push(slot);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..closure.len()).filter(|&s| pending[s] == 0).collect();
    let mut order = Vec::with_capacity(closure.len());
    while let Some(slot) = ready.pop_first() {
        order.push(closure[slot]);
        for &dependent in &dependents[slot] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < closure.len() {
        let blocked: Vec<NodeIndex> = closure
            .iter()
            .zip(&pending)
            .filter(|&(_, &count)| count > 0)
            .map(|(&idx, _)| idx)
            .collect();
        let cycle = find_cycle_among(dg, &blocked)
            .unwrap_or_else(|| blocked.iter().map(|&i| dg.graph[i].id.clone()).collect());
        tracing::debug!(suite = %dg.suite_id, cycle = ?cycle, "external prerequisites form a cycle");
        return Err(PlanError::CycleDetected {
            suite_id: dg.suite_id.clone(),
            cycle,
        });
    }

    Ok(order)
}

/// Dependency depth of each ordered member: members without in-suite
/// dependencies sit at level 0, everything else one level above its deepest
/// in-suite dependency. Members sharing a level are independent.
pub(crate) fn levels(dg: &DependencyGraph, order: &[NodeIndex]) -> HashMap<NodeIndex, usize> {
    let mut levels: HashMap<NodeIndex, usize> = HashMap::with_capacity(order.len());
    for &idx in order {
        let level = dg
            .dependencies_of(idx)
            .iter()
            .filter_map(|dep| levels.get(dep))
            .max()
            .map_or(0, |deepest| deepest + 1);
        levels.insert(idx, level);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::build;
    use crate::store::{InMemoryStore, SuiteStore};
    use crate::testing::{WorkspaceBuilder, depends_on, random_dag, suite_from_edges};
    use proptest::prelude::*;

    fn order_of(store: &InMemoryStore) -> Result<Vec<TestCaseId>, PlanError> {
        let suite = store.suite("S").expect("suite S");
        execution_order(&build(&suite, store))
    }

    #[test]
    fn linear_chain_in_dependency_order() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B", "C"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("C", "S", vec![depends_on("p2", "B")])
            .into_store();
        assert_eq!(order_of(&store).expect("order"), vec!["A", "B", "C"]);
    }

    #[test]
    fn reversed_suite_is_reordered() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["C", "B", "A"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("C", "S", vec![depends_on("p2", "B")])
            .into_store();
        assert_eq!(order_of(&store).expect("order"), vec!["A", "B", "C"]);
    }

    #[test]
    fn unrelated_tests_keep_suite_order() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["Z", "Y", "X", "W"])
            .test("Z", "S", vec![])
            .test("Y", "S", vec![depends_on("p1", "W")])
            .test("X", "S", vec![])
            .test("W", "S", vec![])
            .into_store();
        assert_eq!(order_of(&store).expect("order"), vec!["Z", "X", "W", "Y"]);
    }

    #[test]
    fn order_is_deterministic() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["D", "C", "B", "A"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("C", "S", vec![depends_on("p2", "A")])
            .test("D", "S", vec![depends_on("p3", "B"), depends_on("p4", "C")])
            .into_store();
        let first = order_of(&store).expect("order");
        let second = order_of(&store).expect("order");
        assert_eq!(first, second);
        assert_eq!(first, vec!["A", "C", "B", "D"]);
    }

    #[test]
    fn cycle_fails_closed() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B", "C"])
            .test("A", "S", vec![depends_on("p1", "B")])
            .test("B", "S", vec![depends_on("p2", "A")])
            .test("C", "S", vec![])
            .into_store();
        match order_of(&store) {
            Err(PlanError::CycleDetected { cycle, .. }) => {
                assert_eq!(cycle, vec!["A", "B", "A"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn external_dependencies_do_not_block() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["D"])
            .suite("T", &["E"])
            .test("D", "S", vec![depends_on("p1", "E")])
            .test("E", "T", vec![])
            .into_store();
        assert_eq!(order_of(&store).expect("order"), vec!["D"]);
    }

    #[test]
    fn levels_follow_dependency_depth() {
        let store = WorkspaceBuilder::new()
            .suite("S", &["A", "B", "C", "D"])
            .test("A", "S", vec![])
            .test("B", "S", vec![depends_on("p1", "A")])
            .test("C", "S", vec![])
            .test("D", "S", vec![depends_on("p2", "B"), depends_on("p3", "C")])
            .into_store();
        let suite = store.suite("S").expect("suite");
        let dg = build(&suite, &store);
        let order = ordered_members(&dg).expect("order");
        let levels = levels(&dg, &order);
        let level_of = |id: &str| levels[&dg.node_index(id).expect("node")];
        assert_eq!(level_of("A"), 0);
        assert_eq!(level_of("C"), 0);
        assert_eq!(level_of("B"), 1);
        assert_eq!(level_of("D"), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn random_dag_orders_prerequisites_first((order, edges) in random_dag(12)) {
            let store = suite_from_edges(&order, &edges);
            let planned = order_of(&store).expect("acyclic suite must order");

            let mut sorted = planned.clone();
            sorted.sort();
            let mut members: Vec<TestCaseId> = order.iter().map(|i| format!("t{i}")).collect();
            members.sort();
            prop_assert_eq!(sorted, members);

            let position: HashMap<&str, usize> = planned
                .iter()
                .enumerate()
                .map(|(p, id)| (id.as_str(), p))
                .collect();
            for (from, to) in &edges {
                let from = position[format!("t{from}").as_str()];
                let to = position[format!("t{to}").as_str()];
                prop_assert!(to < from);
            }
        }
    }
}
