//! Entity kinds and the filters rules use to scope themselves.
//!
//! A path's kind is derived from its extension. Rules declare an
//! `EntityFilter`; `Any` is the default and admits every kind.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Script,
    Scene,
    Prefab,
    Audio,
    Image,
    Model,
    AssemblyDefinition,
    Other,
}

impl EntityKind {
    /// Classify a path by its (case-insensitive) extension.
    pub fn of(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "cs" => EntityKind::Script,
            "unity" => EntityKind::Scene,
            "prefab" => EntityKind::Prefab,
            "mp3" | "wav" | "aif" | "ogg" => EntityKind::Audio,
            "bmp" | "tif" | "tga" | "png" | "jpg" | "jpeg" | "psd" => EntityKind::Image,
            "fbx" | "blend" | "c4d" | "mb" | "ma" | "dae" | "obj" | "dxf" | "lxo" | "3ds"
            | "jas" => EntityKind::Model,
            "asmdef" => EntityKind::AssemblyDefinition,
            _ => EntityKind::Other,
        }
    }
}

/// Scoping filter declared by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityFilter {
    #[default]
    Any,
    Kind(EntityKind),
}

impl EntityFilter {
    pub fn admits(self, kind: EntityKind) -> bool {
        match self {
            EntityFilter::Any => true,
            EntityFilter::Kind(k) => k == kind,
        }
    }
}
