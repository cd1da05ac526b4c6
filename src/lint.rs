//! One-shot lint runner.
//!
//! Enumerates the scope, starts an engine over it, ticks until the first pass
//! settles and collects the store's contents into a `LintResult`. With fixes
//! enabled, every fixable issue's action runs and the tree is linted again so
//! the result reflects what is left.

use crate::config::Effective;
use crate::engine::{Engine, EngineConfig};
use crate::error::Result;
use crate::models::{IssueKey, LintResult};
use crate::rules;
use crate::tracker::{scan_tree, ScopeFilter};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
/// Outcome of `--fix`.
pub struct FixReport {
    pub attempted: usize,
    pub applied: usize,
}

/// Build an engine for `eff` and return it with the scope filter it uses.
pub fn build_engine(eff: &Effective) -> Result<(Engine, ScopeFilter)> {
    let filter = ScopeFilter::new(&eff.repo_root, &eff.include, &eff.ignore)?;
    let registry = rules::recommended(&eff.rules, &eff.repo_root)?;
    let predicate = filter.clone();
    let engine = Engine::new(EngineConfig::from_effective(eff), registry, move |p: &str| {
        predicate.is_in_scope(p)
    });
    Ok((engine, filter))
}

/// Snapshot of the engine's store, grouped by severity.
pub fn collect(engine: &Engine) -> LintResult {
    let store = engine.store();
    let issues = store
        .by_severity()
        .into_iter()
        .flat_map(|g| g.issues.into_iter().cloned())
        .collect();
    LintResult {
        issues,
        summary: store.summary(engine.tracker().len()),
    }
}

fn settle(engine: &mut Engine, filter: &ScopeFilter) -> Result<()> {
    let paths = scan_tree(filter)?;
    engine.start(paths);
    engine.run_until_settled()?;
    Ok(())
}

/// Run lint across every in-scope file under the project root.
pub fn run_lint(eff: &Effective) -> Result<LintResult> {
    let (mut engine, filter) = build_engine(eff)?;
    settle(&mut engine, &filter)?;
    let res = collect(&engine);
    engine.stop();
    info!(
        files = res.summary.files,
        issues = res.issues.len(),
        "lint finished"
    );
    Ok(res)
}

/// Lint, apply every available fix, then lint again.
pub fn run_lint_with_fixes(eff: &Effective) -> Result<(LintResult, FixReport)> {
    let (mut engine, filter) = build_engine(eff)?;
    settle(&mut engine, &filter)?;

    let keys: Vec<IssueKey> = engine
        .store()
        .issues()
        .filter(|i| i.is_fixable())
        .map(|i| i.key())
        .collect();
    let mut report = FixReport::default();
    for key in keys.iter() {
        report.attempted += 1;
        match engine.fix(key) {
            Some(true) => report.applied += 1,
            _ => warn!(path = %key.path, message = %key.message, "fix not applied"),
        }
    }

    if report.attempted > 0 {
        // fixes move and delete files; rescan from disk
        settle(&mut engine, &filter)?;
    }
    let res = collect(&engine);
    engine.stop();
    info!(
        attempted = report.attempted,
        applied = report.applied,
        remaining = res.issues.len(),
        "fixes applied"
    );
    Ok((res, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_effective, CliOverrides};
    use crate::models::Severity;
    use std::fs;
    use tempfile::tempdir;

    fn effective(root: &std::path::Path) -> Effective {
        resolve_effective(&CliOverrides {
            repo_root: root.to_str().map(str::to_string),
            ..CliOverrides::default()
        })
        .unwrap()
    }

    #[test]
    fn test_run_lint_groups_by_severity() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Assets/Scripts")).unwrap();
        fs::create_dir_all(root.join("Assets/Scenes")).unwrap();
        fs::write(root.join("lintel.toml"), "[rules.size]\nmax_bytes = 10\n").unwrap();
        fs::write(root.join("Assets/Scripts/Player.cs"), "class Player {}").unwrap();
        fs::write(root.join("Assets/Scripts/player_input.cs"), "class X {}").unwrap();
        fs::write(root.join("Assets/Scenes/Main.unity"), vec![b'x'; 64]).unwrap();
        fs::write(root.join("Assets/Scenes/Main.unity.meta"), "guid").unwrap();

        let res = run_lint(&effective(root)).unwrap();
        assert_eq!(res.summary.files, 3);
        assert_eq!(res.summary.suggestions, 1);
        assert_eq!(res.summary.warnings, 1);
        assert_eq!(res.issues[0].severity, Severity::Suggestion);
        assert_eq!(res.issues[0].path, "Assets/Scripts/player_input.cs");
        assert_eq!(res.issues[1].path, "Assets/Scenes/Main.unity");
    }

    #[test]
    fn test_fixes_apply_and_rescan() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Assets/Code")).unwrap();
        fs::write(root.join("Assets/Code/Enemy.cs"), "class Enemy {}").unwrap();
        fs::create_dir_all(root.join("Assets/Tools")).unwrap();
        fs::write(root.join("Assets/Tools/Tools.asmdef"), "{}").unwrap();

        let (res, report) = run_lint_with_fixes(&effective(root)).unwrap();
        assert_eq!(report, FixReport { attempted: 2, applied: 2 });
        assert!(root.join("Assets/Scripts/Code/Enemy.cs").is_file());
        assert!(!root.join("Assets/Tools/Tools.asmdef").exists());
        assert!(res.issues.is_empty());
        assert_eq!(res.summary.files, 1);
    }
}
