//! Output rendering for lint runs, fix reports and live deltas.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-issue fields and a top-level summary.

use crate::lint::FixReport;
use crate::models::{Issue, LintResult, Severity};
use crate::store::Delta;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

/// `error:` prefix for messages on stderr.
pub fn error_prefix() -> String {
    if std::env::var_os("NO_COLOR").is_none() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if std::env::var_os("NO_COLOR").is_none() {
        "note:".bright_black().to_string()
    } else {
        "note:".to_string()
    }
}

fn tag(sev: Severity, color: bool) -> String {
    let plain = match sev {
        Severity::Error => "⟦error⟧",
        Severity::Warning => "⟦warn⟧",
        Severity::Suggestion => "⟦hint⟧",
        Severity::Info => "⟦info⟧",
    };
    if !color {
        return plain.to_string();
    }
    match sev {
        Severity::Error => plain.red().bold().to_string(),
        Severity::Warning => plain.yellow().bold().to_string(),
        Severity::Suggestion => plain.cyan().bold().to_string(),
        Severity::Info => plain.blue().bold().to_string(),
    }
}

fn icon(sev: Severity, color: bool) -> String {
    let plain = match sev {
        Severity::Error => "✖",
        Severity::Warning => "▲",
        Severity::Suggestion => "◇",
        Severity::Info => "◆",
    };
    if !color {
        return plain.to_string();
    }
    match sev {
        Severity::Error => plain.red().to_string(),
        Severity::Warning => plain.yellow().to_string(),
        Severity::Suggestion => plain.cyan().to_string(),
        Severity::Info => plain.blue().to_string(),
    }
}

/// One human-readable issue line.
pub fn render_issue(is: &Issue, color: bool) -> String {
    let file = if color {
        is.path.clone().bold().to_string()
    } else {
        is.path.clone()
    };
    let fix = if is.is_fixable() { " (fixable)" } else { "" };
    format!(
        "{} {} {} ❲{}❳ — {}{}",
        icon(is.severity, color),
        tag(is.severity, color),
        file,
        is.rule,
        is.message,
        fix
    )
}

fn pretty(v: &JsonVal) -> String {
    serde_json::to_string_pretty(v).unwrap_or_default()
}

/// Print lint results in the requested format.
pub fn print_lint(res: &LintResult, output: &str) {
    match output {
        "json" => println!("{}", pretty(&compose_lint_json(res))),
        _ => {
            let color = use_colors(output);
            for is in &res.issues {
                println!("{}", render_issue(is, color));
            }
            let summary = format!(
                "— Summary — errors={} warnings={} suggestions={} infos={} files={}",
                res.summary.errors,
                res.summary.warnings,
                res.summary.suggestions,
                res.summary.infos,
                res.summary.files
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Print the outcome of `--fix`. JSON output folds it into the lint object instead.
pub fn print_fix_report(report: &FixReport, output: &str) {
    if output == "json" {
        return;
    }
    let line = format!(
        "fixes applied: {}/{}",
        report.applied, report.attempted
    );
    if use_colors(output) {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line);
    }
}

/// Print one store delta during `watch`.
pub fn print_delta(analyzer: &str, delta: &Delta, output: &str) {
    match output {
        "json" => println!(
            "{}",
            serde_json::to_string(&compose_delta_json(analyzer, delta)).unwrap_or_default()
        ),
        _ => {
            let color = use_colors(output);
            for is in &delta.removed {
                let mark = if color {
                    "−".green().bold().to_string()
                } else {
                    "−".to_string()
                };
                println!("{} {}", mark, render_issue(is, color));
            }
            for is in &delta.added {
                let mark = if color {
                    "+".red().bold().to_string()
                } else {
                    "+".to_string()
                };
                println!("{} {}", mark, render_issue(is, color));
            }
        }
    }
}

fn issue_json(is: &Issue) -> JsonVal {
    json!({
        "path": is.path,
        "rule": is.rule,
        "severity": is.severity,
        "message": is.message,
        "fixable": is.is_fixable(),
    })
}

/// Compose lint JSON object (pure) for testing/snapshot purposes.
pub fn compose_lint_json(res: &LintResult) -> JsonVal {
    let items: Vec<JsonVal> = res.issues.iter().map(issue_json).collect();
    json!({
        "issues": items,
        "summary": res.summary,
    })
}

/// Lint JSON with the fix report attached under `fixes`.
pub fn compose_fixed_json(res: &LintResult, report: &FixReport) -> JsonVal {
    let mut out = compose_lint_json(res);
    out["fixes"] = json!(report);
    out
}

/// Compose delta JSON object (pure); one object per line in `watch`.
pub fn compose_delta_json(analyzer: &str, delta: &Delta) -> JsonVal {
    json!({
        "analyzer": analyzer,
        "added": delta.added.iter().map(issue_json).collect::<Vec<_>>(),
        "removed": delta.removed.iter().map(issue_json).collect::<Vec<_>>(),
    })
}
