//! Recommended directory per asset family, with a move-to-fix action.

use crate::config::LocationCfg;
use crate::error::RuleError;
use crate::models::entity::EntityKind;
use crate::models::{FixAction, Issue, Severity};
use crate::registry::Rule;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTargets {
    pub scripts: String,
    pub prefabs: String,
    pub audio: String,
    pub images: String,
    pub models: String,
    pub scenes: String,
}

impl Default for LocationTargets {
    fn default() -> Self {
        LocationTargets {
            scripts: "Assets/Scripts".into(),
            prefabs: "Assets/Prefabs".into(),
            audio: "Assets/Audio".into(),
            images: "Assets/Images".into(),
            models: "Assets/Models".into(),
            scenes: "Assets/Scenes".into(),
        }
    }
}

impl LocationTargets {
    pub fn from_cfg(cfg: &LocationCfg) -> Self {
        let d = LocationTargets::default();
        LocationTargets {
            scripts: cfg.scripts.clone().unwrap_or(d.scripts),
            prefabs: cfg.prefabs.clone().unwrap_or(d.prefabs),
            audio: cfg.audio.clone().unwrap_or(d.audio),
            images: cfg.images.clone().unwrap_or(d.images),
            models: cfg.models.clone().unwrap_or(d.models),
            scenes: cfg.scenes.clone().unwrap_or(d.scenes),
        }
    }

    /// (label, directory) for kinds that have a recommended home.
    fn for_kind(&self, kind: EntityKind) -> Option<(&'static str, &str)> {
        match kind {
            EntityKind::Script => Some(("Scripts", &self.scripts)),
            EntityKind::Prefab => Some(("Prefabs", &self.prefabs)),
            EntityKind::Audio => Some(("Audio files", &self.audio)),
            EntityKind::Image => Some(("Images", &self.images)),
            EntityKind::Model => Some(("Models", &self.models)),
            EntityKind::Scene => Some(("Scenes", &self.scenes)),
            EntityKind::AssemblyDefinition | EntityKind::Other => None,
        }
    }
}

#[derive(Debug)]
pub struct LocationRule {
    root: PathBuf,
    targets: LocationTargets,
}

/// `Assets/Art/hero.png` under `Assets/Images` becomes `Assets/Images/Art/hero.png`.
pub fn relocated(path: &str, target: &str) -> String {
    let rest = path.strip_prefix("Assets/").unwrap_or(path);
    format!(
        "{}/{}",
        target.trim_end_matches('/'),
        rest.trim_start_matches('/')
    )
}

fn move_file(root: &Path, from: &str, to: &str) -> bool {
    let src = root.join(from);
    let dst = root.join(to);
    if dst.exists() {
        debug!(from, to, "move target already exists");
        return false;
    }
    if let Some(parent) = dst.parent() {
        if fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    fs::rename(&src, &dst).is_ok()
}

impl LocationRule {
    pub const ID: &'static str = "location";

    pub fn new(root: impl Into<PathBuf>, targets: LocationTargets) -> Self {
        LocationRule {
            root: root.into(),
            targets,
        }
    }
}

impl Rule for LocationRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError> {
        let Some((label, dir)) = self.targets.for_kind(EntityKind::of(path)) else {
            return Ok(None);
        };
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        if path.starts_with(&prefix) {
            return Ok(None);
        }
        let root = self.root.clone();
        let from = path.to_string();
        let to = relocated(path, dir);
        Ok(Some(
            Issue::new(
                path,
                Self::ID,
                Severity::Suggestion,
                format!("{} should be located under {}", label, dir),
            )
            .with_fix(FixAction::new(move || move_file(&root, &from, &to))),
        ))
    }
}
