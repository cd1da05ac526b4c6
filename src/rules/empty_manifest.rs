//! Assembly definitions that cover no scripts.

use crate::error::RuleError;
use crate::models::entity::{EntityFilter, EntityKind};
use crate::models::{FixAction, Issue, Severity, TrackedPath};
use crate::registry::Rule;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct EmptyManifestRule {
    root: PathBuf,
}

/// Whether any `.cs` file exists anywhere beneath `dir`.
fn has_scripts(dir: &Path) -> std::result::Result<bool, RuleError> {
    let pattern = format!("{}/**/*.cs", Pattern::escape(&dir.to_string_lossy()));
    let mut entries = glob::glob(&pattern).map_err(|e| RuleError(e.msg.to_string()))?;
    Ok(entries.any(|e| e.map(|p| p.is_file()).unwrap_or(false)))
}

impl EmptyManifestRule {
    pub const ID: &'static str = "empty_manifest";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        EmptyManifestRule { root: root.into() }
    }
}

impl Rule for EmptyManifestRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn applicable_type(&self) -> EntityFilter {
        EntityFilter::Kind(EntityKind::AssemblyDefinition)
    }

    fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError> {
        let abs = self.root.join(path);
        let Some(dir) = abs.parent() else {
            return Ok(None);
        };
        if has_scripts(dir)? {
            return Ok(None);
        }
        Ok(Some(
            Issue::new(
                path,
                Self::ID,
                Severity::Warning,
                "Assembly definition files shall not be empty.",
            )
            .with_fix(FixAction::new(move || fs::remove_file(&abs).is_ok())),
        ))
    }

    /// A manifest covers scripts anywhere beneath its directory, so a script
    /// change concerns manifests in every ancestor directory, up to the root.
    fn dependent_dirs(&self, changed: &str) -> Vec<TrackedPath> {
        if EntityKind::of(changed) != EntityKind::Script {
            return Vec::new();
        }
        let mut dirs = Vec::new();
        let mut rest = changed;
        while let Some((dir, _)) = rest.rsplit_once('/') {
            dirs.push(dir.to_string());
            rest = dir;
        }
        dirs.push(String::new());
        dirs
    }
}
