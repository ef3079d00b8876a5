//! The engine's command surface.

use std::sync::Arc;

use crate::cache::{CacheStats, PrerequisiteCache, SystemClock};
use crate::config::EngineConfig;
use crate::fix::{self, FixError, FixKind, FixOutcome, FixProposal};
use crate::graph::builder::{DependencyGraph, build};
use crate::model::{Suite, TestCaseId};
use crate::plan::{self, ExecutionPlan, PlanError};
use crate::runner::{RunError, SuiteRunResult, SuiteRunner, TestExecutor};
use crate::store::{InMemoryStore, ProfileLookup, StoreError, SuiteStore};
use crate::validate::{self, ValidationResult};

/// Validation, planning, fixing and caching over one store.
pub struct Engine {
    store: Arc<dyn SuiteStore>,
    profiles: Arc<dyn ProfileLookup>,
    cache: Arc<PrerequisiteCache>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn SuiteStore>,
        profiles: Arc<dyn ProfileLookup>,
        config: EngineConfig,
    ) -> Self {
        let cache = if config.cache.enabled {
            PrerequisiteCache::new(Arc::new(SystemClock::new()))
        } else {
            PrerequisiteCache::disabled()
        };
        let cache = cache.with_default_expiry(config.cache.default_expiry_ms);
        Self {
            store,
            profiles,
            cache: Arc::new(cache),
            config,
        }
    }

    /// An engine whose store also answers profile lookups.
    pub fn with_store(store: Arc<InMemoryStore>, config: EngineConfig) -> Self {
        let profiles: Arc<dyn ProfileLookup> = store.clone();
        Self::new(store, profiles, config)
    }

    /// Replace the cache, e.g. to share one between engines or use a manual clock.
    pub fn with_cache(mut self, cache: Arc<PrerequisiteCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<PrerequisiteCache> {
        &self.cache
    }

    /// # Errors
    ///
    /// Returns [`StoreError::TestCaseNotFound`] for unknown ids.
    pub fn validate_test_case(&self, test_case_id: &str) -> Result<ValidationResult, StoreError> {
        let test_case = self
            .store
            .test_case(test_case_id)
            .ok_or_else(|| StoreError::TestCaseNotFound(test_case_id.to_owned()))?;
        Ok(validate::validate_test_case(&test_case, self.profiles.as_ref()))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::SuiteNotFound`] for unknown ids.
    pub fn validate_suite(&self, suite_id: &str) -> Result<ValidationResult, StoreError> {
        let suite = self.suite(suite_id)?;
        Ok(validate::validate_suite(
            &suite,
            self.store.as_ref(),
            self.profiles.as_ref(),
        ))
    }

    /// # Errors
    ///
    /// Returns [`StoreError::SuiteNotFound`] for unknown ids.
    pub fn build_dependency_graph(&self, suite_id: &str) -> Result<DependencyGraph, StoreError> {
        let suite = self.suite(suite_id)?;
        Ok(build(&suite, self.store.as_ref()))
    }

    /// # Errors
    ///
    /// Returns [`PlanError::CycleDetected`] for cyclic suites.
    pub fn generate_execution_order(&self, suite_id: &str) -> Result<Vec<TestCaseId>, PlanError> {
        let dg = self.build_dependency_graph(suite_id)?;
        plan::execution_order(&dg)
    }

    /// # Errors
    ///
    /// Returns [`PlanError::CycleDetected`] for cyclic suites.
    pub fn generate_suite_execution_plan(&self, suite_id: &str) -> Result<ExecutionPlan, PlanError> {
        let suite = self.suite(suite_id)?;
        let dg = build(&suite, self.store.as_ref());
        plan::compile(&suite, &dg, &self.cache)
    }

    /// Compute a fix without applying it.
    ///
    /// # Errors
    ///
    /// See [`fix::propose`].
    pub fn preview_fix(&self, suite_id: &str, kind: FixKind) -> Result<FixProposal, FixError> {
        fix::propose(suite_id, kind, self.store.as_ref(), self.profiles.as_ref())
    }

    /// # Errors
    ///
    /// See [`fix::auto_fix`].
    pub fn auto_fix_dependencies(
        &self,
        suite_id: &str,
        kind: FixKind,
    ) -> Result<FixOutcome, FixError> {
        fix::auto_fix(suite_id, kind, self.store.as_ref(), self.profiles.as_ref())
    }

    /// # Errors
    ///
    /// Returns [`FixError::ConcurrentModification`] if the suite changed
    /// after the fix.
    pub fn revert_fix(&self, outcome: &FixOutcome) -> Result<Suite, FixError> {
        fix::revert_fix(outcome, self.store.as_ref())
    }

    /// Plan a suite and run it with `executor`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if the suite is unknown or cannot be planned.
    pub fn run_suite(
        &self,
        suite_id: &str,
        executor: &dyn TestExecutor,
    ) -> Result<SuiteRunResult, RunError> {
        let plan = self.generate_suite_execution_plan(suite_id)?;
        let runner = SuiteRunner::new(self.config.runner.clone(), Arc::clone(&self.cache));
        Ok(runner.run(&plan, executor))
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn suite(&self, suite_id: &str) -> Result<Suite, StoreError> {
        self.store
            .suite(suite_id)
            .ok_or_else(|| StoreError::SuiteNotFound(suite_id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedResult, ManualClock};
    use crate::model::PrerequisiteKind;
    use crate::testing::{RecordingExecutor, WorkspaceBuilder, cached_dependency, depends_on};

    fn engine(builder: WorkspaceBuilder) -> Engine {
        Engine::with_store(Arc::new(builder.into_store()), EngineConfig::default())
            .with_cache(Arc::new(PrerequisiteCache::new(Arc::new(ManualClock::new(0)))))
    }

    fn cross_suite() -> WorkspaceBuilder {
        WorkspaceBuilder::new()
            .suite("S", &["D"])
            .suite("T", &["E"])
            .test("D", "S", vec![cached_dependency("p1", "E", 5_000)])
            .test("E", "T", vec![])
    }

    #[test]
    fn unknown_ids_are_lookup_errors() {
        let engine = engine(WorkspaceBuilder::new());
        assert!(matches!(
            engine.validate_test_case("nope"),
            Err(StoreError::TestCaseNotFound(_))
        ));
        assert!(matches!(
            engine.validate_suite("nope"),
            Err(StoreError::SuiteNotFound(_))
        ));
        assert!(matches!(
            engine.generate_execution_order("nope"),
            Err(PlanError::Store(StoreError::SuiteNotFound(_)))
        ));
    }

    #[test]
    fn cycle_fails_planning_closed() {
        let engine = engine(
            WorkspaceBuilder::new()
                .suite("S", &["A", "B"])
                .test("A", "S", vec![depends_on("p1", "B")])
                .test("B", "S", vec![depends_on("p2", "A")]),
        );
        let err = engine.generate_suite_execution_plan("S").unwrap_err();
        let PlanError::CycleDetected { cycle, suite_id } = err else {
            panic!("expected a cycle");
        };
        assert_eq!(suite_id, "S");
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn fix_then_validate_then_revert() {
        let engine = engine(cross_suite());
        assert!(!engine.validate_suite("S").expect("validate").valid);

        let outcome = engine
            .auto_fix_dependencies("S", FixKind::AddMissing)
            .expect("fix");
        assert_eq!(outcome.added, vec!["E"]);
        assert!(engine.validate_suite("S").expect("validate").valid);

        engine.revert_fix(&outcome).expect("revert");
        assert!(!engine.validate_suite("S").expect("validate").valid);
    }

    #[test]
    fn plan_reflects_cache_and_clear_resets_hint() {
        let engine = engine(cross_suite());
        engine.cache().put("E", CachedResult::Pass, 5_000);
        let plan = engine.generate_suite_execution_plan("S").expect("plan");
        assert!(plan.steps[0].dependencies[0].cached);

        engine.clear_cache();
        let plan = engine.generate_suite_execution_plan("S").expect("plan");
        assert!(!plan.steps[0].dependencies[0].cached);
        assert_eq!(engine.cache_stats().entry_count, 0);
    }

    #[test]
    fn run_suite_uses_shared_cache() {
        let engine = engine(cross_suite());
        let executor = RecordingExecutor::default();
        let result = engine.run_suite("S", &executor).expect("run");
        assert!(result.summary.success());
        assert_eq!(engine.cache_stats().entry_count, 1);

        engine.run_suite("S", &executor).expect("run");
        assert_eq!(executor.tests_run(), vec!["E", "D", "D"]);
        assert_eq!(engine.cache_stats().hit_count, 1);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let config = EngineConfig {
            cache: crate::config::CacheConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::with_store(Arc::new(cross_suite().into_store()), config);
        let executor = RecordingExecutor::default();
        engine.run_suite("S", &executor).expect("run");
        engine.run_suite("S", &executor).expect("run");
        assert_eq!(executor.tests_run(), vec!["E", "D", "E", "D"]);
        assert_eq!(engine.cache_stats().entry_count, 0);
    }

    #[test]
    fn configured_expiry_fills_unset_dependency_expiry() {
        let mut dependency = depends_on("p1", "E");
        if let PrerequisiteKind::TestDependency { use_cache, .. } = &mut dependency.kind {
            *use_cache = true;
        }
        let builder = WorkspaceBuilder::new()
            .suite("S", &["D"])
            .suite("T", &["E"])
            .test("D", "S", vec![dependency, cached_dependency("p2", "E", 5_000)])
            .test("E", "T", vec![]);
        let config = EngineConfig {
            cache: crate::config::CacheConfig {
                default_expiry_ms: 42,
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = Engine::with_store(Arc::new(builder.into_store()), config);

        let plan = engine.generate_suite_execution_plan("S").expect("plan");
        let expiries: Vec<u64> = plan.steps[0]
            .dependencies
            .iter()
            .map(|h| h.cache_expiry_ms)
            .collect();
        assert_eq!(expiries, vec![42, 5_000]);
    }
}
