//! Cooperative, time-budgeted analysis scheduler.
//!
//! A pass walks the cross product of its paths (lexicographic) and the rules
//! applicable to each path (registration order). `tick` processes work items
//! from the front of the cursor until the queue is empty or the budget is
//! spent, then hands control back. Progress lives entirely in the
//! `ScanCursor`; calling `tick` again resumes where the last one stopped.
//!
//! ```text
//! Idle --start_pass--> Scanning --tick (budget spent)--> Scanning
//!                      Scanning --tick (queue empty)---> Settled --tick--> Idle
//! ```
//!
//! When the queue empties, accumulated issues are flushed to the
//! `IssueStore` in one `replace` over the pass scope. Starting a pass while
//! another is scanning discards the in-flight cursor and restarts over the
//! union of both scopes; the discarded cursor contributes nothing.
//!
//! The budget is checked after each item, so every tick makes progress and a
//! slow rule can overrun it by one evaluation.

use crate::models::entity::EntityKind;
use crate::models::{Issue, TrackedPath};
use crate::registry::{evaluate_guarded, Rule, RuleRegistry};
use crate::store::{Delta, IssueStore};
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Monotonic time source for budget accounting.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Whether time passes without anyone advancing it.
    fn runs_by_itself(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            base: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }

    fn runs_by_itself(&self) -> bool {
        false
    }
}

/// One unit of scheduler progress.
#[derive(Clone)]
pub struct WorkItem {
    pub path: TrackedPath,
    pub rule: Arc<dyn Rule>,
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("path", &self.path)
            .field("rule", &self.rule.id())
            .finish()
    }
}

/// Progress of one in-flight pass. Owned by exactly one pass.
#[derive(Debug)]
pub struct ScanCursor {
    pass: u64,
    scope: BTreeSet<TrackedPath>,
    remaining: VecDeque<WorkItem>,
    accumulated: Vec<Issue>,
    total: usize,
    ticks: usize,
}

impl ScanCursor {
    fn build(pass: u64, scope: BTreeSet<TrackedPath>, registry: &RuleRegistry) -> Self {
        let mut remaining = VecDeque::new();
        for path in scope.iter() {
            for rule in registry.rules_for(EntityKind::of(path)) {
                remaining.push_back(WorkItem {
                    path: path.clone(),
                    rule,
                });
            }
        }
        let total = remaining.len();
        ScanCursor {
            pass,
            scope,
            remaining,
            accumulated: Vec::new(),
            total,
            ticks: 0,
        }
    }

    pub fn pass(&self) -> u64 {
        self.pass
    }

    pub fn scope(&self) -> &BTreeSet<TrackedPath> {
        &self.scope
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn accumulated(&self) -> &[Issue] {
        &self.accumulated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scanning,
    Settled,
}

#[derive(Debug)]
enum State {
    Idle,
    Scanning(ScanCursor),
    Settled,
}

/// Summary of a pass that reached `Settled`.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass: u64,
    pub scanned_paths: usize,
    pub work_items: usize,
    pub issues: usize,
    pub ticks: usize,
    pub delta: Delta,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing to do.
    Idle,
    /// Budget spent with work left; call `tick` again.
    Yielded { processed: usize, remaining: usize },
    /// The pass finished and its issues were flushed.
    Settled(PassReport),
}

/// The scheduler state machine. Reusable across any number of passes.
#[derive(Debug)]
pub struct AnalysisScheduler<C: Clock = SystemClock> {
    clock: C,
    state: State,
    next_pass: u64,
}

impl Default for AnalysisScheduler<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisScheduler<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> AnalysisScheduler<C> {
    pub fn with_clock(clock: C) -> Self {
        AnalysisScheduler {
            clock,
            state: State::Idle,
            next_pass: 1,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Scanning(_) => Phase::Scanning,
            State::Settled => Phase::Settled,
        }
    }

    pub fn cursor(&self) -> Option<&ScanCursor> {
        match &self.state {
            State::Scanning(c) => Some(c),
            _ => None,
        }
    }

    /// Scope of the in-flight pass, if any.
    pub fn pending_scope(&self) -> Option<&BTreeSet<TrackedPath>> {
        self.cursor().map(ScanCursor::scope)
    }

    /// Abandon the in-flight pass and return its scope. Its partial results
    /// are dropped.
    pub fn discard(&mut self) -> Option<BTreeSet<TrackedPath>> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Scanning(cursor) => {
                debug!(
                    pass = cursor.pass,
                    done = cursor.total - cursor.remaining.len(),
                    total = cursor.total,
                    "in-flight pass discarded"
                );
                Some(cursor.scope)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Begin a pass over `paths`, restarting over the union if one is in flight.
    pub fn start_pass<I, S>(&mut self, paths: I, registry: &RuleRegistry) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackedPath>,
    {
        let mut scope: BTreeSet<TrackedPath> = paths.into_iter().map(Into::into).collect();
        if let Some(previous) = self.discard() {
            scope.extend(previous);
        }
        let pass = self.next_pass;
        self.next_pass += 1;
        let cursor = ScanCursor::build(pass, scope, registry);
        debug!(
            pass,
            paths = cursor.scope.len(),
            work_items = cursor.total,
            "pass started"
        );
        self.state = State::Scanning(cursor);
        pass
    }

    /// Run one budgeted slice of the current pass.
    pub fn tick(&mut self, budget: Duration, store: &mut IssueStore) -> TickOutcome {
        let (processed, remaining) = match &mut self.state {
            State::Idle => return TickOutcome::Idle,
            State::Settled => {
                self.state = State::Idle;
                return TickOutcome::Idle;
            }
            State::Scanning(cursor) => {
                let started = self.clock.now();
                let mut processed = 0usize;
                while let Some(item) = cursor.remaining.pop_front() {
                    if let Some(issue) = evaluate_guarded(item.rule.as_ref(), &item.path) {
                        cursor.accumulated.push(issue);
                    }
                    processed += 1;
                    if self.clock.now().saturating_duration_since(started) >= budget {
                        break;
                    }
                }
                cursor.ticks += 1;
                (processed, cursor.remaining.len())
            }
        };

        if remaining > 0 {
            return TickOutcome::Yielded {
                processed,
                remaining,
            };
        }

        match std::mem::replace(&mut self.state, State::Settled) {
            State::Scanning(cursor) => {
                let issues = cursor.accumulated.len();
                let scanned_paths = cursor.scope.len();
                let delta = store.replace(cursor.scope, cursor.accumulated);
                info!(
                    pass = cursor.pass,
                    paths = scanned_paths,
                    issues,
                    ticks = cursor.ticks,
                    added = delta.added.len(),
                    removed = delta.removed.len(),
                    "pass settled"
                );
                TickOutcome::Settled(PassReport {
                    pass: cursor.pass,
                    scanned_paths,
                    work_items: cursor.total,
                    issues,
                    ticks: cursor.ticks,
                    delta,
                })
            }
            other => {
                self.state = other;
                TickOutcome::Idle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::models::entity::EntityFilter;
    use crate::models::Severity;
    use proptest::prelude::*;

    /// Flags every path and costs a fixed slice of manual time.
    struct Costly {
        id: &'static str,
        clock: ManualClock,
        cost: Duration,
    }

    impl Rule for Costly {
        fn id(&self) -> &str {
            self.id
        }
        fn evaluate(&self, path: &str) -> Result<Option<Issue>, RuleError> {
            self.clock.advance(self.cost);
            Ok(Some(Issue::new(
                path,
                self.id,
                Severity::Warning,
                format!("{} saw {}", self.id, path),
            )))
        }
    }

    struct ScenesOnly;

    impl Rule for ScenesOnly {
        fn id(&self) -> &str {
            "scenes"
        }
        fn applicable_type(&self) -> EntityFilter {
            EntityFilter::Kind(EntityKind::Scene)
        }
        fn evaluate(&self, path: &str) -> Result<Option<Issue>, RuleError> {
            Ok(Some(Issue::new(path, "scenes", Severity::Error, "scene")))
        }
    }

    struct Explodes;

    impl Rule for Explodes {
        fn id(&self) -> &str {
            "explodes"
        }
        fn evaluate(&self, path: &str) -> Result<Option<Issue>, RuleError> {
            if path == "b" {
                panic!("bad file");
            }
            Ok(Some(Issue::new(path, "explodes", Severity::Info, "ok")))
        }
    }

    fn registry(clock: &ManualClock) -> RuleRegistry {
        let mut reg = RuleRegistry::new();
        for id in ["first", "second"] {
            reg.register(Costly {
                id,
                clock: clock.clone(),
                cost: Duration::from_millis(10),
            })
            .unwrap();
        }
        reg
    }

    fn keys(store: &IssueStore) -> Vec<(String, String)> {
        store
            .issues()
            .map(|i| (i.path.clone(), i.message.clone()))
            .collect()
    }

    #[test]
    fn two_items_per_tick_settles_after_three_ticks() {
        let clock = ManualClock::new();
        let reg = registry(&clock);
        let mut sched = AnalysisScheduler::with_clock(clock.clone());
        let mut store = IssueStore::new("assets");

        sched.start_pass(["c", "a", "b"], &reg);
        assert_eq!(sched.cursor().map(ScanCursor::total), Some(6));
        let budget = Duration::from_millis(20);

        assert!(matches!(
            sched.tick(budget, &mut store),
            TickOutcome::Yielded { processed: 2, remaining: 4 }
        ));
        assert!(store.is_empty());
        assert!(matches!(
            sched.tick(budget, &mut store),
            TickOutcome::Yielded { processed: 2, remaining: 2 }
        ));
        let report = match sched.tick(budget, &mut store) {
            TickOutcome::Settled(r) => r,
            other => panic!("expected settle, got {:?}", other),
        };
        assert_eq!(report.ticks, 3);
        assert_eq!(report.issues, 6);
        assert_eq!(sched.phase(), Phase::Settled);
        assert!(matches!(sched.tick(budget, &mut store), TickOutcome::Idle));
        assert_eq!(sched.phase(), Phase::Idle);

        // identical to a single unbounded pass
        let clock2 = ManualClock::new();
        let reg2 = registry(&clock2);
        let mut once = AnalysisScheduler::with_clock(clock2);
        let mut store2 = IssueStore::new("assets");
        once.start_pass(["a", "b", "c"], &reg2);
        assert!(matches!(
            once.tick(Duration::MAX, &mut store2),
            TickOutcome::Settled(_)
        ));
        assert_eq!(keys(&store), keys(&store2));
    }

    #[test]
    fn order_is_paths_then_registration() {
        let clock = ManualClock::new();
        let reg = registry(&clock);
        let mut sched = AnalysisScheduler::with_clock(clock);
        let mut store = IssueStore::new("assets");
        sched.start_pass(["b", "a"], &reg);
        let report = match sched.tick(Duration::MAX, &mut store) {
            TickOutcome::Settled(r) => r,
            other => panic!("expected settle, got {:?}", other),
        };
        let msgs: Vec<&str> = report.delta.added.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            msgs,
            vec!["first saw a", "second saw a", "first saw b", "second saw b"]
        );
    }

    #[test]
    fn work_queue_respects_entity_filters() {
        let mut reg = RuleRegistry::new();
        reg.register(ScenesOnly).unwrap();
        let mut sched = AnalysisScheduler::new();
        sched.start_pass(["Assets/Main.unity", "Assets/Player.cs"], &reg);
        assert_eq!(sched.cursor().map(ScanCursor::total), Some(1));
    }

    #[test]
    fn panicking_rule_does_not_abort_pass() {
        let mut reg = RuleRegistry::new();
        reg.register(Explodes).unwrap();
        let mut sched = AnalysisScheduler::new();
        let mut store = IssueStore::new("assets");
        sched.start_pass(["a", "b", "c"], &reg);
        assert!(matches!(
            sched.tick(Duration::MAX, &mut store),
            TickOutcome::Settled(_)
        ));
        let paths: Vec<&str> = store.issues().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "c"]);
    }

    #[test]
    fn restart_scans_union_and_drops_partial_results() {
        let clock = ManualClock::new();
        let reg = registry(&clock);
        let mut sched = AnalysisScheduler::with_clock(clock.clone());
        let mut store = IssueStore::new("assets");

        let first = sched.start_pass(["a", "b"], &reg);
        sched.tick(Duration::from_millis(10), &mut store);
        assert_eq!(sched.cursor().map(ScanCursor::remaining), Some(3));

        let second = sched.start_pass(["c"], &reg);
        assert!(second > first);
        let scope: Vec<&str> = sched
            .pending_scope()
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default();
        assert_eq!(scope, vec!["a", "b", "c"]);
        assert_eq!(sched.cursor().map(ScanCursor::remaining), Some(6));
        assert!(store.is_empty());

        let report = match sched.tick(Duration::MAX, &mut store) {
            TickOutcome::Settled(r) => r,
            other => panic!("expected settle, got {:?}", other),
        };
        assert_eq!(report.pass, second);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn settled_pass_replaces_only_its_scope() {
        let clock = ManualClock::new();
        let reg = registry(&clock);
        let mut sched = AnalysisScheduler::with_clock(clock);
        let mut store = IssueStore::new("assets");
        store.replace(["z"], vec![Issue::new("z", "x", Severity::Error, "keep me")]);

        sched.start_pass(["a"], &reg);
        sched.tick(Duration::MAX, &mut store);
        assert_eq!(store.issues_for("z").len(), 1);
        assert_eq!(store.len(), 3);

        // an unchanged rescan is churn-free
        sched.start_pass(["a"], &reg);
        match sched.tick(Duration::MAX, &mut store) {
            TickOutcome::Settled(r) => assert!(r.delta.is_empty()),
            other => panic!("expected settle, got {:?}", other),
        }
    }

    #[test]
    fn empty_pass_settles_immediately() {
        let mut sched = AnalysisScheduler::new();
        let mut store = IssueStore::new("assets");
        sched.start_pass(Vec::<String>::new(), &RuleRegistry::new());
        assert!(matches!(
            sched.tick(Duration::ZERO, &mut store),
            TickOutcome::Settled(_)
        ));
    }

    proptest! {
        #[test]
        fn tick_granularity_never_changes_result(
            names in proptest::collection::btree_set("[a-e]{1,3}", 0..8),
            per_tick in 1u64..8,
        ) {
            let clock = ManualClock::new();
            let reg = registry(&clock);
            let mut sched = AnalysisScheduler::with_clock(clock);
            let mut store = IssueStore::new("assets");
            sched.start_pass(names.iter().cloned(), &reg);
            let budget = Duration::from_millis(10 * per_tick);
            let mut ticks = 0;
            loop {
                ticks += 1;
                match sched.tick(budget, &mut store) {
                    TickOutcome::Settled(_) => break,
                    TickOutcome::Yielded { processed, .. } => {
                        prop_assert_eq!(processed as u64, per_tick)
                    }
                    TickOutcome::Idle => prop_assert!(false, "idle before settle"),
                }
                prop_assert!(ticks < 100);
            }

            let clock2 = ManualClock::new();
            let reg2 = registry(&clock2);
            let mut once = AnalysisScheduler::with_clock(clock2);
            let mut store2 = IssueStore::new("assets");
            once.start_pass(names.iter().cloned(), &reg2);
            once.tick(Duration::MAX, &mut store2);
            prop_assert_eq!(keys(&store), keys(&store2));
        }
    }
}
