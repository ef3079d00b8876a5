use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::emit::dot::emit_dot;
use crate::emit::mermaid::emit_mermaid;
use crate::emit::report::format_validation;
use crate::emit::yaml::{emit_json, emit_yaml};
use crate::engine::Engine;
use crate::fix::{FixError, FixKind};
use crate::store::{InMemoryStore, Workspace};
use crate::validate::ValidationResult;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Workspace file (`.yaml`, `.yml` or `.json`).
    pub workspace: PathBuf,
    /// Optional engine config file.
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            config: None,
        }
    }
}

/// Load the config and workspace and build an engine over them.
fn open(options: &GlobalOptions) -> Result<Engine, String> {
    let config = EngineConfig::load(options.config.as_deref()).map_err(|e| e.to_string())?;
    let workspace = Workspace::load(&options.workspace).map_err(|e| e.to_string())?;
    Ok(Engine::with_store(Arc::new(InMemoryStore::new(workspace)), config))
}

fn parse_fix_kind(kind: &str) -> Result<FixKind, String> {
    match kind {
        "add-missing" => Ok(FixKind::AddMissing),
        "reorder" => Ok(FixKind::Reorder),
        other => Err(format!(
            "unknown fix type '{other}' (expected: add-missing, reorder)"
        )),
    }
}

fn render_validation(subject: &str, result: &ValidationResult, format: &str) -> Result<String, String> {
    match format {
        "text" => Ok(format_validation(subject, result)),
        "yaml" => emit_yaml(result),
        "json" => emit_json(result),
        other => Err(format!(
            "unknown format '{other}' (expected: text, yaml, json)"
        )),
    }
}

fn write_or_return(output: Option<&PathBuf>, content: String, what: &str) -> Result<String, String> {
    match output {
        Some(out_path) => {
            std::fs::write(out_path, &content)
                .map_err(|e| format!("failed to write {}: {e}", out_path.display()))?;
            Ok(format!("{what} written to {}\n", out_path.display()))
        }
        None => Ok(content),
    }
}

/// Run the `validate` command on a suite.
///
/// Returns the report and whether the suite is valid.
///
/// # Errors
///
/// Returns an error string if the workspace cannot be loaded or the suite
/// does not exist.
pub fn run_validate(
    options: &GlobalOptions,
    suite_id: &str,
    format: &str,
) -> Result<(String, bool), String> {
    let engine = open(options)?;
    let result = engine
        .validate_suite(suite_id)
        .map_err(|e| e.to_string())?;
    let report = render_validation(&format!("suite {suite_id}"), &result, format)?;
    Ok((report, result.valid))
}

/// Run the `validate-test` command on a single test case.
///
/// Returns the report and whether the test case is valid.
///
/// # Errors
///
/// Returns an error string if the workspace cannot be loaded or the test
/// case does not exist.
pub fn run_validate_test(
    options: &GlobalOptions,
    test_case_id: &str,
    format: &str,
) -> Result<(String, bool), String> {
    let engine = open(options)?;
    let result = engine
        .validate_test_case(test_case_id)
        .map_err(|e| e.to_string())?;
    let report = render_validation(&format!("test case {test_case_id}"), &result, format)?;
    Ok((report, result.valid))
}

/// Run the `graph` command: render a suite's dependency graph.
///
/// # Errors
///
/// Returns an error string for unknown suites or formats.
pub fn run_graph(
    options: &GlobalOptions,
    suite_id: &str,
    format: &str,
    output: Option<&PathBuf>,
) -> Result<String, String> {
    let engine = open(options)?;
    let dg = engine
        .build_dependency_graph(suite_id)
        .map_err(|e| e.to_string())?;

    let rendered = match format {
        "dot" => emit_dot(&dg),
        "mermaid" => emit_mermaid(&dg),
        "yaml" => emit_yaml(&dg.to_view())?,
        "json" => emit_json(&dg.to_view())?,
        other => {
            return Err(format!(
                "unknown format '{other}' (expected: json, yaml, dot, mermaid)"
            ));
        }
    };
    write_or_return(output, rendered, "graph")
}

/// Run the `order` command: print the execution order, one id per line.
///
/// # Errors
///
/// Returns an error string if the suite is unknown or cyclic.
pub fn run_order(options: &GlobalOptions, suite_id: &str) -> Result<String, String> {
    let engine = open(options)?;
    let order = engine
        .generate_execution_order(suite_id)
        .map_err(|e| e.to_string())?;
    Ok(order.iter().map(|id| format!("{id}\n")).collect())
}

/// Run the `plan` command: compile a suite into an execution plan.
///
/// # Errors
///
/// Returns an error string if the suite is unknown or cyclic, or the format
/// is not supported.
pub fn run_plan(
    options: &GlobalOptions,
    suite_id: &str,
    format: &str,
    output: Option<&PathBuf>,
) -> Result<String, String> {
    let engine = open(options)?;
    let plan = engine
        .generate_suite_execution_plan(suite_id)
        .map_err(|e| e.to_string())?;

    let rendered = match format {
        "yaml" => emit_yaml(&plan)?,
        "json" => emit_json(&plan)?,
        other => return Err(format!("unknown format '{other}' (expected: yaml, json)")),
    };
    write_or_return(output, rendered, "plan")
}

/// Run the `fix` command.
///
/// Applies the fix and writes the fixed suite back to the workspace file
/// atomically, unless `dry_run` is set, in which case only the proposed
/// change is reported. If the suite was edited on disk since it was loaded,
/// nothing is written.
///
/// # Errors
///
/// Returns an error string if no fix applies, the suite still has errors
/// that block reordering, the suite changed on disk, or the workspace cannot
/// be written.
pub fn run_fix(
    options: &GlobalOptions,
    suite_id: &str,
    kind: &str,
    dry_run: bool,
) -> Result<String, String> {
    let kind = parse_fix_kind(kind)?;
    let engine = open(options)?;

    if dry_run {
        let proposal = engine
            .preview_fix(suite_id, kind)
            .map_err(|e| e.to_string())?;
        let mut out = describe_change(suite_id, kind, &proposal.added, &proposal.test_case_ids, true);
        out.push_str(&emit_yaml(&proposal)?);
        return Ok(out);
    }

    let outcome = engine
        .auto_fix_dependencies(suite_id, kind)
        .map_err(|e| e.to_string())?;
    Workspace::commit_suite(&options.workspace, &outcome.previous, &outcome.suite)
        .map_err(|e| FixError::from(e).to_string())?;

    let mut out = describe_change(
        suite_id,
        kind,
        &outcome.added,
        &outcome.suite.test_case_ids,
        false,
    );
    out.push_str(&format_validation(
        &format!("suite {suite_id}"),
        &outcome.revalidation,
    ));
    Ok(out)
}

fn describe_change(
    suite_id: &str,
    kind: FixKind,
    added: &[String],
    order: &[String],
    dry_run: bool,
) -> String {
    let verb = match (kind, dry_run) {
        (FixKind::AddMissing, true) => "would add",
        (FixKind::AddMissing, false) => "added",
        (FixKind::Reorder, true) => "would reorder",
        (FixKind::Reorder, false) => "reordered",
    };
    match kind {
        FixKind::AddMissing => format!("{verb} {} to suite {suite_id}\n", added.join(", ")),
        FixKind::Reorder => format!("{verb} suite {suite_id}: {}\n", order.join(", ")),
    }
}

/// Run the `list` command: list suites, tests or profiles in the workspace.
///
/// # Errors
///
/// Returns an error string if the workspace cannot be loaded or `what` is
/// invalid.
pub fn run_list(options: &GlobalOptions, what: &str) -> Result<String, String> {
    let workspace = Workspace::load(&options.workspace).map_err(|e| e.to_string())?;
    let mut lines = Vec::new();

    match what {
        "suites" => {
            for suite in &workspace.suites {
                lines.push(format!(
                    "{} ({} tests, version {})",
                    suite.id,
                    suite.test_case_ids.len(),
                    suite.version
                ));
            }
        }
        "tests" => {
            for tc in &workspace.test_cases {
                let mut line = format!("{} [{}]", tc.id, tc.suite_id);
                if !tc.name.is_empty() {
                    line.push_str(&format!(" {}", tc.name));
                }
                if !tc.enabled {
                    line.push_str(" (disabled)");
                }
                lines.push(line);
            }
        }
        "profiles" => {
            for profile in &workspace.setup_profiles {
                let state = if profile.enabled { "" } else { " (disabled)" };
                lines.push(format!("{}{state}", profile.id));
            }
        }
        other => {
            return Err(format!(
                "unknown list target '{other}' (expected: suites, tests, profiles)"
            ));
        }
    }

    Ok(lines.iter().map(|l| format!("{l}\n")).collect())
}

