//! Authoritative set of tracked paths.
//!
//! `PathSetTracker` is the single writer of the tracked set. It filters raw
//! notifications through a scope predicate, applies them, and reports the
//! net `ChangeSet`. A batch of events coalesces: create-then-delete cancels
//! out, a chain of renames collapses to one `(origin, final)` pair, and
//! duplicate creates/deletes are idempotent.
//!
//! Directory notifications are expanded: deleting or renaming a path that is
//! not itself tracked applies to every tracked path beneath it.

use crate::error::{LintelError, Result};
use crate::models::change::{ChangeSet, MoveBatch, RawEvent};
use crate::models::TrackedPath;
use glob::{MatchOptions, Pattern};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type Predicate = Box<dyn Fn(&str) -> bool + Send>;

/// Tracks the in-scope file set and turns raw events into change sets.
pub struct PathSetTracker {
    paths: BTreeSet<TrackedPath>,
    in_scope: Predicate,
}

/// Where a currently tracked path's content came from within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lineage {
    /// The file that sat at this path when the batch began.
    Original(TrackedPath),
    /// Created during the batch.
    Fresh,
}

/// Per-batch bookkeeping. Only paths touched by the batch appear here; a
/// tracked path with no `lineage` entry still holds its original file.
#[derive(Default)]
struct Pending {
    /// touched path -> whether it was tracked when the batch began
    existed: BTreeMap<TrackedPath, bool>,
    lineage: BTreeMap<TrackedPath, Lineage>,
    touched: BTreeSet<TrackedPath>,
}

impl Pending {
    fn note(&mut self, p: &str, tracked: &BTreeSet<TrackedPath>) {
        if !self.existed.contains_key(p) {
            self.existed.insert(p.to_string(), tracked.contains(p));
        }
    }

    /// Net effect, judged by where each original file ended up.
    fn into_change_set(self, tracked: &BTreeSet<TrackedPath>) -> ChangeSet {
        let survivors: BTreeSet<&TrackedPath> = self
            .lineage
            .values()
            .filter_map(|l| match l {
                Lineage::Original(o) => Some(o),
                Lineage::Fresh => None,
            })
            .collect();
        let mut cs = ChangeSet::default();
        for (p, existed) in &self.existed {
            if tracked.contains(p) {
                match self.lineage.get(p) {
                    Some(Lineage::Original(o)) if o != p => {
                        cs.renamed.push((o.clone(), p.clone()));
                    }
                    Some(Lineage::Fresh) if !existed => {
                        cs.added.insert(p.clone());
                    }
                    Some(Lineage::Fresh) => {
                        // the pre-batch file was replaced by a new one
                        cs.modified.insert(p.clone());
                    }
                    _ => {
                        if self.touched.contains(p) {
                            cs.modified.insert(p.clone());
                        }
                    }
                }
            } else if *existed && !survivors.contains(p) {
                cs.removed.insert(p.clone());
            }
        }
        cs
    }
}

impl PathSetTracker {
    pub fn new(in_scope: impl Fn(&str) -> bool + Send + 'static) -> Self {
        PathSetTracker {
            paths: BTreeSet::new(),
            in_scope: Box::new(in_scope),
        }
    }

    /// Replace the tracked set with the in-scope subset of `all_paths`.
    pub fn initialize<I, S>(&mut self, all_paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackedPath>,
    {
        self.paths.clear();
        for p in all_paths {
            let p = p.into();
            if (self.in_scope)(&p) {
                self.paths.insert(p);
            }
        }
        info!(tracked = self.paths.len(), "tracked set initialized");
    }

    /// Apply a single raw event.
    pub fn apply_change(&mut self, event: RawEvent) -> ChangeSet {
        self.apply_all([event])
    }

    /// Apply events in order and report their combined net effect.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = RawEvent>) -> ChangeSet {
        let mut pending = Pending::default();
        for ev in events {
            match ev {
                RawEvent::Created(p) => self.create(&mut pending, p),
                RawEvent::Deleted(p) => self.delete(&mut pending, p),
                RawEvent::Modified(p) => self.modify(&mut pending, p),
                RawEvent::Renamed { from, to } => self.rename(&mut pending, from, to),
            }
        }
        let cs = pending.into_change_set(&self.paths);
        debug!(
            added = cs.added.len(),
            removed = cs.removed.len(),
            renamed = cs.renamed.len(),
            modified = cs.modified.len(),
            "change set applied"
        );
        cs
    }

    /// Apply an import-callback shaped batch (see `MoveBatch::into_events`).
    pub fn apply_batch(&mut self, batch: MoveBatch) -> ChangeSet {
        self.apply_all(batch.into_events())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedPath> {
        self.paths.iter()
    }

    /// Tracked paths in lexicographic order.
    pub fn snapshot(&self) -> Vec<TrackedPath> {
        self.paths.iter().cloned().collect()
    }

    fn descendants(&self, dir: &str) -> Vec<TrackedPath> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.paths
            .range(prefix.clone()..)
            .take_while(|p| p.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn create(&mut self, acc: &mut Pending, p: TrackedPath) {
        if !(self.in_scope)(&p) {
            return;
        }
        acc.note(&p, &self.paths);
        if self.paths.insert(p.clone()) {
            acc.lineage.insert(p, Lineage::Fresh);
        } else {
            acc.touched.insert(p);
        }
    }

    fn modify(&mut self, acc: &mut Pending, p: TrackedPath) {
        if self.paths.contains(&p) {
            acc.note(&p, &self.paths);
            acc.touched.insert(p);
        } else {
            // a modify for an unseen path means its create was lost
            self.create(acc, p);
        }
    }

    fn delete(&mut self, acc: &mut Pending, p: TrackedPath) {
        if !self.paths.contains(&p) {
            let children = self.descendants(&p);
            if children.is_empty() {
                debug!(path = %p, "delete for untracked path ignored");
            }
            for child in children {
                self.delete(acc, child);
            }
            return;
        }
        acc.note(&p, &self.paths);
        self.paths.remove(&p);
        acc.lineage.remove(&p);
        acc.touched.remove(&p);
    }

    fn rename(&mut self, acc: &mut Pending, from: TrackedPath, to: TrackedPath) {
        if from == to {
            self.modify(acc, to);
            return;
        }
        if !self.paths.contains(&from) {
            let children = self.descendants(&from);
            if children.is_empty() {
                self.create(acc, to);
                return;
            }
            let base_to = to.trim_end_matches('/').to_string();
            for child in children {
                let suffix = child[from.trim_end_matches('/').len()..].to_string();
                self.rename(acc, child, format!("{}{}", base_to, suffix));
            }
            return;
        }
        if !(self.in_scope)(&to) {
            self.delete(acc, from);
            return;
        }

        acc.note(&from, &self.paths);
        acc.note(&to, &self.paths);
        let lineage = acc
            .lineage
            .remove(&from)
            .unwrap_or_else(|| Lineage::Original(from.clone()));
        acc.touched.remove(&from);
        self.paths.remove(&from);
        // an existing file at the destination is overwritten
        self.paths.insert(to.clone());
        acc.lineage.insert(to.clone(), lineage);
        acc.touched.insert(to);
    }
}

/// Host-side scope predicate: include/ignore globs over root-relative paths,
/// excluding directories.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    root: PathBuf,
    include: Vec<Pattern>,
    ignore: Vec<Pattern>,
}

const MATCH_OPTS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| LintelError::Pattern {
                pattern: p.clone(),
                message: e.msg.to_string(),
            })
        })
        .collect()
}

impl ScopeFilter {
    /// An empty `include` list admits every file under `root`.
    pub fn new(root: impl Into<PathBuf>, include: &[String], ignore: &[String]) -> Result<Self> {
        let include = if include.is_empty() {
            compile(&["**/*".to_string()])?
        } else {
            compile(include)?
        };
        Ok(ScopeFilter {
            root: root.into(),
            include,
            ignore: compile(ignore)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pattern check only; does not touch the filesystem.
    pub fn matches(&self, rel: &str) -> bool {
        let rel = Path::new(rel);
        self.include.iter().any(|p| p.matches_path_with(rel, MATCH_OPTS))
            && !self.ignore.iter().any(|p| p.matches_path_with(rel, MATCH_OPTS))
    }

    /// "Is this a real, in-scope, non-directory file".
    pub fn is_in_scope(&self, rel: &str) -> bool {
        self.matches(rel) && !self.root.join(rel).is_dir()
    }

    /// Convert an absolute (or root-joined) path into a tracked path.
    pub fn relativize(&self, path: &Path) -> Option<TrackedPath> {
        let rel = if path.is_absolute() {
            pathdiff::diff_paths(path, &self.root)?
        } else {
            path.to_path_buf()
        };
        if rel.starts_with("..") {
            return None;
        }
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

/// Full enumeration of the in-scope files under the filter's root, sorted.
pub fn scan_tree(filter: &ScopeFilter) -> Result<Vec<TrackedPath>> {
    let mut candidates: BTreeSet<TrackedPath> = BTreeSet::new();
    for pat in filter.include.iter() {
        let abs = filter.root.join(pat.as_str());
        candidates.extend(glob_relative(filter, &abs.to_string_lossy())?);
    }
    Ok(keep_in_scope(filter, candidates))
}

/// In-scope files beneath the root-relative directory `dir`, sorted.
///
/// Used when a directory appears in one notification (created with content
/// or moved in from outside the root).
pub fn scan_dir(filter: &ScopeFilter, dir: &str) -> Result<Vec<TrackedPath>> {
    let base = Pattern::escape(&filter.root.join(dir).to_string_lossy());
    let candidates = glob_relative(filter, &format!("{}/**/*", base))?;
    Ok(keep_in_scope(filter, candidates))
}

fn glob_relative(filter: &ScopeFilter, pattern: &str) -> Result<BTreeSet<TrackedPath>> {
    let entries = glob::glob(pattern).map_err(|e| LintelError::Pattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;
    Ok(entries
        .flatten()
        .filter_map(|entry| filter.relativize(&entry))
        .collect())
}

fn keep_in_scope(filter: &ScopeFilter, candidates: BTreeSet<TrackedPath>) -> Vec<TrackedPath> {
    let mut paths: Vec<TrackedPath> = candidates
        .into_par_iter()
        .filter(|p| filter.is_in_scope(p))
        .collect();
    paths.sort();
    paths
}
