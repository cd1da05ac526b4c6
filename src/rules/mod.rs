//! Built-in asset rules.
//!
//! Each rule is a predicate over one tracked path plus the settings it was
//! built with. `recommended` assembles the enabled ones into a registry in a
//! fixed order: naming, location, size, empty manifest.

pub mod empty_manifest;
pub mod location;
pub mod naming;
pub mod size;

pub use empty_manifest::EmptyManifestRule;
pub use location::{LocationRule, LocationTargets};
pub use naming::{NamingConvention, NamingConventionRule};
pub use size::FileSizeRule;

use crate::config::RulesCfg;
use crate::error::Result;
use crate::registry::RuleRegistry;
use std::path::Path;
use tracing::debug;

/// Registry with every enabled built-in rule. Filesystem rules resolve paths against `root`.
pub fn recommended(cfg: &RulesCfg, root: &Path) -> Result<RuleRegistry> {
    let mut reg = RuleRegistry::new();

    let naming = cfg.naming.clone().unwrap_or_default();
    if naming.enabled.unwrap_or(true) {
        let conventions = naming
            .conventions
            .unwrap_or_else(NamingConventionRule::default_conventions);
        reg.register(NamingConventionRule::new(&conventions)?)?;
    }

    let location = cfg.location.clone().unwrap_or_default();
    if location.enabled.unwrap_or(true) {
        reg.register(LocationRule::new(root, LocationTargets::from_cfg(&location)))?;
    }

    let limits = cfg.size.clone().unwrap_or_default();
    if limits.enabled.unwrap_or(true) {
        let max = limits.max_bytes.unwrap_or(size::DEFAULT_MAX_BYTES);
        reg.register(FileSizeRule::new(root, max))?;
    }

    if cfg
        .empty_manifest
        .as_ref()
        .and_then(|t| t.enabled)
        .unwrap_or(true)
    {
        reg.register(EmptyManifestRule::new(root))?;
    }

    debug!(rules = ?reg, "rule registry built");
    Ok(reg)
}
