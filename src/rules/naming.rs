//! File naming conventions keyed by extension.

use crate::error::{LintelError, Result, RuleError};
use crate::models::{Issue, Severity};
use crate::registry::Rule;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamingConvention {
    AllCaps,
    LowerCamelCase,
    UpperCamelCase,
    SnakeCase,
}

impl NamingConvention {
    /// Accepts the canonical names plus a few common spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AllCaps" | "ALL_CAPS" | "all_caps" => Some(NamingConvention::AllCaps),
            "LowerCamelCase" | "lowerCamelCase" | "camelCase" => {
                Some(NamingConvention::LowerCamelCase)
            }
            "UpperCamelCase" | "PascalCase" => Some(NamingConvention::UpperCamelCase),
            "SnakeCase" | "snake_case" => Some(NamingConvention::SnakeCase),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NamingConvention::AllCaps => "AllCaps",
            NamingConvention::LowerCamelCase => "LowerCamelCase",
            NamingConvention::UpperCamelCase => "UpperCamelCase",
            NamingConvention::SnakeCase => "SnakeCase",
        }
    }

    // AllCaps is unanchored on the left: any stem ending in a run of caps passes.
    fn pattern(self) -> &'static str {
        match self {
            NamingConvention::AllCaps => r"[A-Z\d_]+$",
            NamingConvention::LowerCamelCase => r"^[a-z]{1}([a-z0-9]+|([A-Z]{1,2}[a-z0-9]+))*$",
            NamingConvention::UpperCamelCase => r"^([A-Z]{1,2}?[a-z0-9]+)*$",
            NamingConvention::SnakeCase => r"^[a-z]+[_a-z0-9]*[a-z0-9]$",
        }
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags file stems that do not match the convention for their extension.
#[derive(Debug)]
pub struct NamingConventionRule {
    conventions: BTreeMap<String, NamingConvention>,
    validators: BTreeMap<NamingConvention, Regex>,
}

fn normalize_ext(ext: &str) -> String {
    format!(".{}", ext.trim_start_matches('.').to_ascii_lowercase())
}

impl NamingConventionRule {
    pub const ID: &'static str = "naming";

    pub fn default_conventions() -> BTreeMap<String, String> {
        BTreeMap::from([
            (".cs".to_string(), "UpperCamelCase".to_string()),
            (".blend".to_string(), "UpperCamelCase".to_string()),
        ])
    }

    pub fn new(conventions: &BTreeMap<String, String>) -> Result<Self> {
        let mut resolved = BTreeMap::new();
        let mut validators = BTreeMap::new();
        for (ext, name) in conventions {
            let conv = NamingConvention::parse(name).ok_or_else(|| LintelError::RuleConfig {
                rule: Self::ID.to_string(),
                message: format!("unknown naming convention '{}' for '{}'", name, ext),
            })?;
            if !validators.contains_key(&conv) {
                let re = Regex::new(conv.pattern()).map_err(|e| LintelError::RuleConfig {
                    rule: Self::ID.to_string(),
                    message: e.to_string(),
                })?;
                validators.insert(conv, re);
            }
            resolved.insert(normalize_ext(ext), conv);
        }
        Ok(NamingConventionRule {
            conventions: resolved,
            validators,
        })
    }

    pub fn matches(&self, conv: NamingConvention, stem: &str) -> bool {
        self.validators
            .get(&conv)
            .is_some_and(|re| re.is_match(stem))
    }
}

impl Rule for NamingConventionRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError> {
        let p = Path::new(path);
        let (Some(ext), Some(stem)) = (
            p.extension().and_then(|e| e.to_str()),
            p.file_stem().and_then(|s| s.to_str()),
        ) else {
            return Ok(None);
        };
        let Some(conv) = self.conventions.get(&normalize_ext(ext)).copied() else {
            return Ok(None);
        };
        if self.matches(conv, stem) {
            return Ok(None);
        }
        Ok(Some(Issue::new(
            path,
            Self::ID,
            Severity::Suggestion,
            format!("The filename does not match the convention: {}", conv),
        )))
    }
}
