//! Scene file size limit.

use crate::error::RuleError;
use crate::models::entity::{EntityFilter, EntityKind};
use crate::models::{Issue, Severity};
use crate::registry::Rule;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_MAX_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug)]
pub struct FileSizeRule {
    root: PathBuf,
    max_bytes: u64,
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

impl FileSizeRule {
    pub const ID: &'static str = "size";

    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        FileSizeRule {
            root: root.into(),
            max_bytes,
        }
    }
}

impl Rule for FileSizeRule {
    fn id(&self) -> &str {
        Self::ID
    }

    fn applicable_type(&self) -> EntityFilter {
        EntityFilter::Kind(EntityKind::Scene)
    }

    fn evaluate(&self, path: &str) -> std::result::Result<Option<Issue>, RuleError> {
        let len = fs::metadata(self.root.join(path))?.len();
        if len <= self.max_bytes {
            return Ok(None);
        }
        Ok(Some(Issue::new(
            path,
            Self::ID,
            Severity::Warning,
            format!(
                "The file size exceeds the recommended limit of {:.2} MB. Actual: {:.2} MB",
                megabytes(self.max_bytes),
                megabytes(len)
            ),
        )))
    }
}
