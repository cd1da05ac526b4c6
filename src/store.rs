//! Canonical collection of current issues with delta emission.
//!
//! `replace` swaps the issues of a path subset for a new list and reports the
//! difference. Issues are compared structurally (path, severity, message), so
//! re-finding the same problem produces no churn for subscribers. Paths
//! outside the subset are never touched.

use crate::models::{Issue, IssueKey, Severity, Summary, TrackedPath};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Added/removed difference produced by one `replace`.
#[derive(Debug, Clone, Default)]
pub struct Delta {
    pub added: Vec<Issue>,
    pub removed: Vec<Issue>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Read-only view of one severity bucket.
#[derive(Debug)]
pub struct SeverityGroup<'a> {
    pub severity: Severity,
    pub issues: Vec<&'a Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&str, &Delta) + Send>;

/// Issue store for one analyzer.
pub struct IssueStore {
    analyzer: String,
    issues: BTreeMap<TrackedPath, Vec<Issue>>,
    count: usize,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl std::fmt::Debug for IssueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueStore")
            .field("analyzer", &self.analyzer)
            .field("count", &self.count)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl IssueStore {
    pub fn new(analyzer: impl Into<String>) -> Self {
        IssueStore {
            analyzer: analyzer.into(),
            issues: BTreeMap::new(),
            count: 0,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn analyzer(&self) -> &str {
        &self.analyzer
    }

    /// Register an `on_issues_changed(analyzer, delta)` callback.
    ///
    /// Callbacks run on the execution thread, once per non-empty delta.
    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&str, &Delta) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        before != self.subscribers.len()
    }

    /// Replace every issue stored for `subset` with `new_issues`.
    ///
    /// Issues in `new_issues` whose path lies outside `subset` are dropped.
    pub fn replace<I, S>(&mut self, subset: I, new_issues: Vec<Issue>) -> Delta
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackedPath>,
    {
        let subset: BTreeSet<TrackedPath> = subset.into_iter().map(Into::into).collect();
        let mut incoming: BTreeMap<TrackedPath, Vec<Issue>> = BTreeMap::new();
        for is in new_issues {
            if subset.contains(&is.path) {
                incoming.entry(is.path.clone()).or_default().push(is);
            } else {
                warn!(path = %is.path, rule = %is.rule, "issue outside replaced subset dropped");
            }
        }

        let mut delta = Delta::default();
        for path in subset {
            let old = self.issues.remove(&path).unwrap_or_default();
            let new = incoming.remove(&path).unwrap_or_default();
            let mut matched = vec![false; old.len()];
            for is in new.iter() {
                let key = is.key();
                let hit = old
                    .iter()
                    .enumerate()
                    .position(|(i, o)| !matched[i] && o.key() == key);
                match hit {
                    Some(i) => matched[i] = true,
                    None => delta.added.push(is.clone()),
                }
            }
            delta.removed.extend(
                old.into_iter()
                    .zip(matched)
                    .filter(|(_, m)| !m)
                    .map(|(is, _)| is),
            );
            if !new.is_empty() {
                self.issues.insert(path, new);
            }
        }

        self.count = self.count + delta.added.len() - delta.removed.len();
        debug!(
            analyzer = %self.analyzer,
            added = delta.added.len(),
            removed = delta.removed.len(),
            total = self.count,
            "issue store replaced"
        );
        if !delta.is_empty() {
            for (_, cb) in self.subscribers.iter_mut() {
                cb(&self.analyzer, &delta);
            }
        }
        delta
    }

    /// Drop all issues for paths that no longer exist.
    pub fn invalidate<I, S>(&mut self, paths: I) -> Delta
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackedPath>,
    {
        self.replace(paths, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// All issues, ordered by path then production order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.issues.values().flatten()
    }

    pub fn issues_for(&self, path: &str) -> &[Issue] {
        self.issues.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Issues grouped by severity (ascending), each group sorted by path.
    pub fn by_severity(&self) -> Vec<SeverityGroup<'_>> {
        let mut groups: BTreeMap<Severity, Vec<&Issue>> = BTreeMap::new();
        for is in self.issues() {
            groups.entry(is.severity).or_default().push(is);
        }
        groups
            .into_iter()
            .map(|(severity, issues)| SeverityGroup { severity, issues })
            .collect()
    }

    pub fn summary(&self, files: usize) -> Summary {
        Summary::from_issues(self.issues(), files)
    }

    /// Run the fix attached to the issue identified by `key`.
    ///
    /// `None` when no such issue exists or it carries no fix. The issue stays
    /// stored either way; only a later pass over its path can clear it.
    pub fn apply_fix(&self, key: &IssueKey) -> Option<bool> {
        let fix = self
            .issues_for(&key.path)
            .iter()
            .find(|is| is.key() == *key)?
            .fix
            .clone()?;
        let ok = fix.run();
        if !ok {
            warn!(path = %key.path, message = %key.message, "fix action failed");
        }
        Some(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FixAction;
    use std::sync::{Arc, Mutex};

    fn issue(path: &str, msg: &str) -> Issue {
        Issue::new(path, "rule", Severity::Warning, msg)
    }

    #[test]
    fn unchanged_issue_yields_empty_delta_and_leaves_other_paths() {
        let mut store = IssueStore::new("assets");
        store.replace(["a", "b"], vec![issue("a", "X"), issue("b", "Y")]);
        assert_eq!(store.len(), 2);

        let delta = store.replace(["a"], vec![issue("a", "X")]);
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(store.issues_for("b").len(), 1);
        assert_eq!(store.issues_for("b")[0].message, "Y");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replace_reports_added_and_removed() {
        let mut store = IssueStore::new("assets");
        store.replace(["a"], vec![issue("a", "old"), issue("a", "kept")]);
        let delta = store.replace(["a"], vec![issue("a", "kept"), issue("a", "new")]);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].message, "new");
        assert_eq!(delta.removed.len(), 1);
        assert_eq!(delta.removed[0].message, "old");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn severity_change_counts_as_new_issue() {
        let mut store = IssueStore::new("assets");
        store.replace(["a"], vec![issue("a", "m")]);
        let delta = store.replace(["a"], vec![Issue::new("a", "rule", Severity::Error, "m")]);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.removed.len(), 1);
    }

    #[test]
    fn duplicate_keys_match_as_a_multiset() {
        let mut store = IssueStore::new("assets");
        store.replace(["a"], vec![issue("a", "dup"), issue("a", "dup")]);
        let delta = store.replace(["a"], vec![issue("a", "dup")]);
        assert!(delta.added.is_empty());
        assert_eq!(delta.removed.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn issues_outside_subset_are_dropped() {
        let mut store = IssueStore::new("assets");
        let delta = store.replace(["a"], vec![issue("a", "in"), issue("z", "out")]);
        assert_eq!(delta.added.len(), 1);
        assert!(store.issues_for("z").is_empty());
    }

    #[test]
    fn invalidate_clears_paths() {
        let mut store = IssueStore::new("assets");
        store.replace(["a", "b"], vec![issue("a", "1"), issue("b", "2")]);
        let delta = store.invalidate(["a", "missing"]);
        assert_eq!(delta.removed.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.issues_for("a").is_empty());
    }

    #[test]
    fn by_severity_sorts_groups_then_paths() {
        let mut store = IssueStore::new("assets");
        store.replace(
            ["b", "a", "c"],
            vec![
                Issue::new("c", "r", Severity::Error, "e"),
                Issue::new("b", "r", Severity::Suggestion, "s"),
                Issue::new("a", "r", Severity::Suggestion, "s"),
                Issue::new("a", "r", Severity::Info, "i"),
            ],
        );
        let groups = store.by_severity();
        let sevs: Vec<Severity> = groups.iter().map(|g| g.severity).collect();
        assert_eq!(sevs, vec![Severity::Info, Severity::Suggestion, Severity::Error]);
        let paths: Vec<&str> = groups[1].issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }

    #[test]
    fn subscribers_see_non_empty_deltas_until_unsubscribed() {
        let seen: Arc<Mutex<Vec<(String, usize, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut store = IssueStore::new("assets");
        let sink = seen.clone();
        let id = store.subscribe(move |analyzer, delta| {
            sink.lock()
                .unwrap()
                .push((analyzer.to_string(), delta.added.len(), delta.removed.len()));
        });
        store.replace(["a"], vec![issue("a", "X")]);
        store.replace(["a"], vec![issue("a", "X")]);
        store.replace(["a"], vec![]);
        assert!(store.unsubscribe(id));
        store.replace(["a"], vec![issue("a", "X")]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("assets".to_string(), 1, 0), ("assets".to_string(), 0, 1)]
        );
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn fix_runs_but_issue_stays_until_next_pass() {
        let mut store = IssueStore::new("assets");
        let fixed = issue("a", "fixable").with_fix(FixAction::new(|| true));
        let broken = issue("a", "broken").with_fix(FixAction::new(|| false));
        store.replace(["a"], vec![fixed.clone(), broken.clone(), issue("a", "plain")]);

        assert_eq!(store.apply_fix(&fixed.key()), Some(true));
        assert_eq!(store.apply_fix(&broken.key()), Some(false));
        assert_eq!(store.apply_fix(&issue("a", "plain").key()), None);
        assert_eq!(store.len(), 3);
    }
}
