use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CachedResult, PrerequisiteCache, Resolution, ResolutionSource};
use crate::config::RunnerConfig;
use crate::plan::types::{DependencyHint, ExecutionPlan, PlanStep};
use crate::runner::backend::{ExecError, TestExecutor};
use crate::runner::result::{
    DependencyOutcome, RunSummary, StepResult, StepStatus, SuiteRunResult,
};

/// Walks an execution plan and hands the work to a [`TestExecutor`].
///
/// Steps run in plan order. A step is skipped when it is disabled, when an
/// in-suite dependency did not pass, or when an external prerequisite test
/// fails. An external prerequisite runs as a full step of its own: its
/// dependencies first, then its profiles, state setup, body and cleanup.
/// Those marked `use_cache` are resolved through the shared cache, so
/// concurrent runs needing the same prerequisite execute it once. Tests that
/// pass and are cacheable dependencies of another step are recorded in the
/// cache.
pub struct SuiteRunner {
    config: RunnerConfig,
    cache: Arc<PrerequisiteCache>,
}

/// Outside tests resolved while preparing one step.
struct ExternalRun<'p> {
    plan: &'p ExecutionPlan,
    passed: &'p HashSet<&'p str>,
    resolved: HashMap<String, Resolution>,
}

impl SuiteRunner {
    pub fn new(config: RunnerConfig, cache: Arc<PrerequisiteCache>) -> Self {
        Self { config, cache }
    }

    pub fn run(&self, plan: &ExecutionPlan, executor: &dyn TestExecutor) -> SuiteRunResult {
        let start = Instant::now();
        let cacheable = cacheable_expiries(plan);
        let mut results = Vec::with_capacity(plan.steps.len());
        let mut passed: HashSet<&str> = HashSet::new();
        let mut not_passed: HashSet<&str> = HashSet::new();
        let mut stop = false;

        for step in &plan.steps {
            let id = step.test_case_id.as_str();
            let result = if stop {
                StepResult::skipped(id, "fail-fast: an earlier test failed")
            } else if !step.enabled {
                StepResult::skipped(id, "test case is disabled")
            } else if let Some(dep) = step.depends_on.iter().find(|d| not_passed.contains(d.as_str())) {
                StepResult::skipped(id, format!("dependency '{dep}' did not pass"))
            } else {
                let mut externals = ExternalRun {
                    plan,
                    passed: &passed,
                    resolved: HashMap::new(),
                };
                self.execute_step(step, executor, &mut externals)
            };

            tracing::debug!(test_case = id, status = %result.status, "step finished");

            if result.passed() {
                if let Some(&expiry_ms) = cacheable.get(id) {
                    self.cache.put(id, CachedResult::Pass, expiry_ms);
                }
                passed.insert(id);
            } else {
                not_passed.insert(id);
                if matches!(result.status, StepStatus::Failed | StepStatus::Error)
                    && self.config.fail_fast
                {
                    stop = true;
                }
            }
            results.push(result);
        }

        let summary = RunSummary::from_results(&results);
        tracing::info!(
            suite = %plan.plan.suite_id,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            errors = summary.errors,
            "suite run finished"
        );

        SuiteRunResult {
            suite_id: plan.plan.suite_id.clone(),
            total_duration: start.elapsed(),
            steps: results,
            summary,
        }
    }

    fn execute_step(
        &self,
        step: &PlanStep,
        executor: &dyn TestExecutor,
        externals: &mut ExternalRun<'_>,
    ) -> StepResult {
        let start = Instant::now();
        let id = step.test_case_id.as_str();

        let mut dependencies: Vec<DependencyOutcome> = Vec::new();
        for hint in step.dependencies.iter().filter(|h| !h.in_suite) {
            if dependencies.iter().any(|d| d.test_case_id == hint.test_case_id) {
                continue;
            }
            let resolution = self.resolve_external(hint, executor, externals);
            dependencies.push(DependencyOutcome {
                test_case_id: hint.test_case_id.clone(),
                result: resolution.result,
                source: resolution.source,
            });

            if resolution.result == CachedResult::Fail {
                let mut result = StepResult::skipped(
                    id,
                    format!("prerequisite test '{}' failed", hint.test_case_id),
                );
                result.dependencies = dependencies;
                return result;
            }
        }

        let outcome = run_body(step, executor);
        let cleanup_errors = run_cleanup(step, executor, outcome.is_ok());

        let (status, message) = match outcome {
            Ok(()) => (StepStatus::Passed, None),
            Err(err) if err.is_test_failure() => (StepStatus::Failed, Some(err.to_string())),
            Err(err) => (StepStatus::Error, Some(err.to_string())),
        };

        StepResult {
            message,
            dependencies,
            cleanup_errors,
            ..StepResult::new(id, status, start.elapsed())
        }
    }

    /// Satisfy one outside test, at most once per step being prepared.
    fn resolve_external(
        &self,
        hint: &DependencyHint,
        executor: &dyn TestExecutor,
        externals: &mut ExternalRun<'_>,
    ) -> Resolution {
        if let Some(&done) = externals.resolved.get(&hint.test_case_id) {
            return done;
        }

        let id = hint.test_case_id.as_str();
        let resolution = if hint.use_cache {
            self.cache.resolve(id, hint.cache_expiry_ms, || {
                self.run_external(id, executor, externals)
            })
        } else {
            Resolution {
                result: self.run_external(id, executor, externals),
                source: ResolutionSource::Executed,
            }
        };
        externals.resolved.insert(hint.test_case_id.clone(), resolution);
        resolution
    }

    fn run_external(
        &self,
        test_case_id: &str,
        executor: &dyn TestExecutor,
        externals: &mut ExternalRun<'_>,
    ) -> CachedResult {
        match self.try_external(test_case_id, executor, externals) {
            Ok(()) => CachedResult::Pass,
            Err(err) => {
                tracing::warn!(test_case = test_case_id, error = %err, "prerequisite test failed");
                CachedResult::Fail
            }
        }
    }

    fn try_external(
        &self,
        test_case_id: &str,
        executor: &dyn TestExecutor,
        externals: &mut ExternalRun<'_>,
    ) -> Result<(), ExecError> {
        let plan = externals.plan;
        let step = plan.external_step(test_case_id).ok_or_else(|| {
            ExecError::Unavailable(format!("prerequisite test '{test_case_id}' does not exist"))
        })?;
        if !step.enabled {
            return Err(ExecError::Unavailable(format!(
                "prerequisite test '{test_case_id}' is disabled"
            )));
        }

        for hint in &step.dependencies {
            let satisfied = if hint.in_suite {
                externals.passed.contains(hint.test_case_id.as_str())
            } else {
                self.resolve_external(hint, executor, externals).result == CachedResult::Pass
            };
            if !satisfied {
                return Err(ExecError::Failed(format!(
                    "{test_case_id} needs '{}', which did not pass",
                    hint.test_case_id
                )));
            }
        }

        let outcome = run_body(step, executor);
        run_cleanup(step, executor, outcome.is_ok());
        outcome
    }
}

/// Setup profiles, then state setup, then the test itself.
fn run_body(step: &PlanStep, executor: &dyn TestExecutor) -> Result<(), ExecError> {
    for profile in &step.setup_profiles {
        executor.apply_setup_profile(profile)?;
    }
    for block in &step.state_setup {
        executor.run_actions(&step.test_case_id, &block.actions)?;
    }
    executor.run_test(&step.test_case_id)
}

/// Cleanup blocks due after the body; failures are collected, never fatal.
fn run_cleanup(step: &PlanStep, executor: &dyn TestExecutor, passed: bool) -> Vec<String> {
    let mut errors = Vec::new();
    for block in step.cleanup.iter().filter(|b| b.always_run || !passed) {
        if let Err(err) = executor.run_actions(&step.test_case_id, &block.actions) {
            tracing::warn!(
                test_case = %step.test_case_id,
                prerequisite = %block.prerequisite_id,
                error = %err,
                "cleanup failed"
            );
            errors.push(format!("{}: {err}", block.prerequisite_id));
        }
    }
    errors
}

/// Longest expiry requested for each test that some step may take from cache.
fn cacheable_expiries(plan: &ExecutionPlan) -> HashMap<&str, u64> {
    let mut expiries: HashMap<&str, u64> = HashMap::new();
    for hint in plan
        .steps
        .iter()
        .chain(&plan.external_steps)
        .flat_map(|s| &s.dependencies)
        .filter(|h| h.use_cache)
    {
        let expiry = expiries.entry(hint.test_case_id.as_str()).or_default();
        *expiry = (*expiry).max(hint.cache_expiry_ms);
    }
    expiries
}
