//! Shared data models: tracked paths, issues, severities and lint summaries.

pub mod change;
pub mod entity;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Root-relative, `/`-separated file identifier. Unique within the tracked set.
pub type TrackedPath = String;

/// Issue severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Suggestion,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Suggestion => "suggestion",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// No-arg repair closure attached to an issue. Returns whether the fix applied.
#[derive(Clone)]
pub struct FixAction(Arc<dyn Fn() -> bool + Send + Sync>);

impl FixAction {
    pub fn new(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        FixAction(Arc::new(f))
    }

    /// Run the fix. A panicking fix reports `false` instead of unwinding.
    pub fn run(&self) -> bool {
        catch_unwind(AssertUnwindSafe(|| (self.0)())).unwrap_or(false)
    }
}

impl fmt::Debug for FixAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FixAction(..)")
    }
}

#[derive(Debug, Clone, Serialize)]
/// A single finding produced by a rule for one path.
pub struct Issue {
    pub path: TrackedPath,
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip)]
    pub fix: Option<FixAction>,
}

impl Issue {
    pub fn new(
        path: impl Into<TrackedPath>,
        rule: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Issue {
            path: path.into(),
            rule: rule.into(),
            severity,
            message: message.into(),
            fix: None,
        }
    }

    pub fn with_fix(mut self, fix: FixAction) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn is_fixable(&self) -> bool {
        self.fix.is_some()
    }

    /// Structural identity used when diffing successive passes.
    pub fn key(&self) -> IssueKey {
        IssueKey {
            path: self.path.clone(),
            severity: self.severity,
            message: self.message.clone(),
        }
    }
}

/// Path + severity + message. Two issues with equal keys are "unchanged".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct IssueKey {
    pub path: TrackedPath,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
/// Aggregated counts used by printers and exit codes.
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
    pub infos: usize,
    pub files: usize,
}

impl Summary {
    pub fn from_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>, files: usize) -> Self {
        let mut s = Summary {
            files,
            ..Summary::default()
        };
        for is in issues {
            match is.severity {
                Severity::Error => s.errors += 1,
                Severity::Warning => s.warnings += 1,
                Severity::Suggestion => s.suggestions += 1,
                Severity::Info => s.infos += 1,
            }
        }
        s
    }
}

#[derive(Debug, Serialize)]
/// Lint results container.
pub struct LintResult {
    pub issues: Vec<Issue>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_info_to_error() {
        assert!(Severity::Info < Severity::Suggestion);
        assert!(Severity::Suggestion < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn panicking_fix_reports_failure() {
        let fix = FixAction::new(|| panic!("boom"));
        assert!(!fix.run());
        assert!(FixAction::new(|| true).run());
    }

    #[test]
    fn summary_counts_by_severity() {
        let issues = vec![
            Issue::new("a", "r", Severity::Error, "x"),
            Issue::new("b", "r", Severity::Warning, "x"),
            Issue::new("c", "r", Severity::Suggestion, "x"),
            Issue::new("d", "r", Severity::Suggestion, "y"),
        ];
        let s = Summary::from_issues(&issues, 4);
        assert_eq!(s.errors, 1);
        assert_eq!(s.warnings, 1);
        assert_eq!(s.suggestions, 2);
        assert_eq!(s.infos, 0);
        assert_eq!(s.files, 4);
    }
}
