//! Raw filesystem notifications and the net change sets derived from them.

use super::TrackedPath;
use std::collections::BTreeSet;
use tracing::warn;

/// A single notification from the host's event feed.
///
/// Delivered at least once; duplicates and out-of-order renames are expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Created(TrackedPath),
    Deleted(TrackedPath),
    Modified(TrackedPath),
    Renamed { from: TrackedPath, to: TrackedPath },
}

impl RawEvent {
    /// Every path the event mentions (both ends for renames).
    pub fn paths(&self) -> Vec<&str> {
        match self {
            RawEvent::Created(p) | RawEvent::Deleted(p) | RawEvent::Modified(p) => vec![p],
            RawEvent::Renamed { from, to } => vec![from, to],
        }
    }
}

/// Import-callback shaped batch: parallel `moved`/`moved_from` lists next to
/// plain imports and deletions.
#[derive(Debug, Clone, Default)]
pub struct MoveBatch {
    pub imported: Vec<TrackedPath>,
    pub deleted: Vec<TrackedPath>,
    pub moved: Vec<TrackedPath>,
    pub moved_from: Vec<TrackedPath>,
}

impl MoveBatch {
    /// Flatten into ordered raw events: imports, deletions, then moves.
    ///
    /// When `moved` and `moved_from` differ in length the pairing cannot be
    /// trusted; every move entry then degrades to an independent create
    /// (`moved`) or delete (`moved_from`).
    pub fn into_events(self) -> Vec<RawEvent> {
        let mut events = Vec::with_capacity(
            self.imported.len() + self.deleted.len() + self.moved.len() + self.moved_from.len(),
        );
        for p in self.imported {
            if !self.moved.contains(&p) {
                events.push(RawEvent::Created(p));
            }
        }
        events.extend(self.deleted.into_iter().map(RawEvent::Deleted));
        if self.moved.len() == self.moved_from.len() {
            events.extend(
                self.moved_from
                    .into_iter()
                    .zip(self.moved)
                    .map(|(from, to)| RawEvent::Renamed { from, to }),
            );
        } else {
            warn!(
                moved = self.moved.len(),
                moved_from = self.moved_from.len(),
                "rename pairing mismatch; treating moves as independent add/remove"
            );
            events.extend(self.moved_from.into_iter().map(RawEvent::Deleted));
            events.extend(self.moved.into_iter().map(RawEvent::Created));
        }
        events
    }
}

/// Net effect of applying one or more raw events to the tracked set.
///
/// A path appears in at most one of `added`, `removed`, `modified` and the
/// `to` side of `renamed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: BTreeSet<TrackedPath>,
    pub removed: BTreeSet<TrackedPath>,
    /// `(from, to)` pairs, sorted by `to`.
    pub renamed: Vec<(TrackedPath, TrackedPath)>,
    pub modified: BTreeSet<TrackedPath>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.renamed.is_empty()
            && self.modified.is_empty()
    }

    /// Paths that now exist and need (re-)analysis.
    pub fn affected(&self) -> BTreeSet<TrackedPath> {
        let mut out: BTreeSet<TrackedPath> = self.added.clone();
        out.extend(self.modified.iter().cloned());
        out.extend(self.renamed.iter().map(|(_, to)| to.clone()));
        out
    }

    /// Paths that no longer exist; their issues are stale.
    pub fn invalidated(&self) -> BTreeSet<TrackedPath> {
        let mut out: BTreeSet<TrackedPath> = self.removed.clone();
        out.extend(self.renamed.iter().map(|(from, _)| from.clone()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_moves_become_renames() {
        let batch = MoveBatch {
            imported: vec!["Assets/New.txt".into(), "Assets/Fresh.cs".into()],
            deleted: vec!["Assets/Gone.cs".into()],
            moved: vec!["Assets/New.txt".into()],
            moved_from: vec!["Assets/Old.txt".into()],
        };
        let events = batch.into_events();
        assert_eq!(
            events,
            vec![
                RawEvent::Created("Assets/Fresh.cs".into()),
                RawEvent::Deleted("Assets/Gone.cs".into()),
                RawEvent::Renamed {
                    from: "Assets/Old.txt".into(),
                    to: "Assets/New.txt".into()
                },
            ]
        );
    }

    #[test]
    fn mismatched_moves_degrade_to_add_remove() {
        let batch = MoveBatch {
            moved: vec!["Assets/B.cs".into(), "Assets/C.cs".into()],
            moved_from: vec!["Assets/A.cs".into()],
            ..MoveBatch::default()
        };
        let events = batch.into_events();
        assert_eq!(
            events,
            vec![
                RawEvent::Deleted("Assets/A.cs".into()),
                RawEvent::Created("Assets/B.cs".into()),
                RawEvent::Created("Assets/C.cs".into()),
            ]
        );
    }

    #[test]
    fn affected_and_invalidated_split_renames() {
        let mut cs = ChangeSet::default();
        cs.added.insert("a".into());
        cs.removed.insert("b".into());
        cs.modified.insert("c".into());
        cs.renamed.push(("d".into(), "e".into()));
        assert_eq!(
            cs.affected().into_iter().collect::<Vec<_>>(),
            vec!["a", "c", "e"]
        );
        assert_eq!(
            cs.invalidated().into_iter().collect::<Vec<_>>(),
            vec!["b", "d"]
        );
    }
}
