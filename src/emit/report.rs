use std::fmt::Write;

use crate::validate::{Severity, ValidationIssue, ValidationResult};

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "ERROR",
        Severity::Warning => "WARN",
    }
}

/// Format one issue, with its suggested fix on a continuation line.
pub fn format_issue(issue: &ValidationIssue) -> String {
    let mut line = format!(
        "  [{}] {}: {}",
        severity_label(issue.severity),
        issue.issue_type,
        issue.message
    );
    if let Some(fix) = &issue.suggested_fix {
        let mode = if fix.auto_applicable { "auto" } else { "manual" };
        let _ = write!(line, "\n         → fix ({mode}): {}", fix.description);
    }
    line
}

/// Format a validation result for the terminal.
pub fn format_validation(subject: &str, result: &ValidationResult) -> String {
    let errors = result.errors().count();
    let warnings = result.warnings().count();
    let verdict = if result.valid { "valid" } else { "INVALID" };

    let mut out = format!("{subject}: {verdict}");
    if errors + warnings > 0 {
        let _ = write!(out, " ({errors} error(s), {warnings} warning(s))");
    }
    out.push('\n');

    for issue in &result.issues {
        out.push_str(&format_issue(issue));
        out.push('\n');
    }

    if let Some(order) = &result.execution_order {
        let _ = writeln!(out, "Execution order: {}", order.join(", "));
    }
    out
}
