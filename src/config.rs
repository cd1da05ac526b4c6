//! Configuration discovery and effective settings resolution.
//!
//! Lintel reads `lintel.toml|yaml|yml` from the project root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `include`: `["Assets/**/*"]`
//! - `ignore`: `["**/*.meta"]`
//! - `output`: `human`
//! - `engine.analyzer`: `assets`
//! - `engine.debounce_ms`: 100
//! - `engine.frame_rate`: 30, with `tick_budget_ms` derived as `1000 / frame_rate`
//! - `engine.poll_ms`: 16
//! - every rule enabled with its built-in settings
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{LintelError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_NAMES: [&str; 3] = ["lintel.toml", "lintel.yaml", "lintel.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Engine timing and identity under `[engine]`.
pub struct EngineCfg {
    pub analyzer: Option<String>,
    pub debounce_ms: Option<u64>,
    pub frame_rate: Option<u32>,
    pub tick_budget_ms: Option<u64>,
    pub poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[rules.naming]`: extension -> convention name.
pub struct NamingCfg {
    pub enabled: Option<bool>,
    pub conventions: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[rules.location]`: recommended directory per asset family.
pub struct LocationCfg {
    pub enabled: Option<bool>,
    pub scripts: Option<String>,
    pub prefabs: Option<String>,
    pub audio: Option<String>,
    pub images: Option<String>,
    pub models: Option<String>,
    pub scenes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[rules.size]`: scene size limit in bytes.
pub struct SizeCfg {
    pub enabled: Option<bool>,
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Rules that only carry an on/off switch.
pub struct ToggleCfg {
    pub enabled: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Per-rule sections under `[rules.<id>]`.
pub struct RulesCfg {
    pub naming: Option<NamingCfg>,
    pub location: Option<LocationCfg>,
    pub size: Option<SizeCfg>,
    pub empty_manifest: Option<ToggleCfg>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `lintel.toml|yaml`.
pub struct LintelConfig {
    pub include: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
    pub output: Option<String>,
    pub engine: Option<EngineCfg>,
    #[serde(default)]
    pub rules: RulesCfg,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    pub output: String,
    pub analyzer: String,
    pub debounce: Duration,
    pub frame_rate: u32,
    pub tick_budget: Duration,
    pub poll: Duration,
    pub rules: RulesCfg,
}

/// CLI-provided overrides; `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub output: Option<String>,
    pub debounce_ms: Option<u64>,
    pub tick_budget_ms: Option<u64>,
}

/// Walk upward from `start` to detect the project root.
///
/// Stops when a `lintel.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `LintelConfig` from `lintel.toml` or `lintel.yaml|yml` if present.
///
/// A missing file is `Ok(None)`; an unreadable or malformed one is an error.
pub fn load_config(root: &Path) -> Result<Option<LintelConfig>> {
    for name in CONFIG_NAMES {
        let p = root.join(name);
        if !p.exists() {
            continue;
        }
        let shown = p.display().to_string();
        let s = fs::read_to_string(&p).map_err(|source| LintelError::ConfigIo {
            path: shown.clone(),
            source,
        })?;
        let cfg: LintelConfig = if name.ends_with(".toml") {
            toml::from_str(&s).map_err(|e| LintelError::ConfigParse {
                path: shown,
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&s).map_err(|e| LintelError::ConfigParse {
                path: shown,
                message: e.to_string(),
            })?
        };
        return Ok(Some(cfg));
    }
    Ok(None)
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let cfg = load_config(&repo_root)?.unwrap_or_default();
    let engine = cfg.engine.unwrap_or_default();

    let include = cfg
        .include
        .unwrap_or_else(|| vec!["Assets/**/*".to_string()]);
    let ignore = cfg.ignore.unwrap_or_else(|| vec!["**/*.meta".to_string()]);

    let output = cli
        .output
        .clone()
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    let analyzer = engine.analyzer.unwrap_or_else(|| "assets".to_string());
    let debounce_ms = cli.debounce_ms.or(engine.debounce_ms).unwrap_or(100);
    // a zero frame rate would divide by zero below
    let frame_rate = engine.frame_rate.unwrap_or(30).max(1);
    let tick_budget_ms = cli
        .tick_budget_ms
        .or(engine.tick_budget_ms)
        .unwrap_or(1000 / u64::from(frame_rate));
    let poll_ms = engine.poll_ms.unwrap_or(16);

    Ok(Effective {
        repo_root,
        include,
        ignore,
        output,
        analyzer,
        debounce: Duration::from_millis(debounce_ms),
        frame_rate,
        tick_budget: Duration::from_millis(tick_budget_ms),
        poll: Duration::from_millis(poll_ms),
        rules: cfg.rules,
    })
}
