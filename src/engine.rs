//! The analysis engine: one object wiring tracker, debouncer, scheduler,
//! issue store and task queue together, with an explicit lifecycle.
//!
//! Everything except `EngineHandle` lives on the execution thread. Other
//! threads talk to the engine only by enqueueing closures through a handle;
//! those closures run during the next `tick`, before anything else.
//!
//! One `tick`:
//! 1. drain the task queue (raw events land in the debouncer here);
//! 2. if the debouncer has settled, apply the batch to the tracker, drop
//!    issues of removed or renamed-away paths, and (re)start a pass over the
//!    affected paths, merged with any pass still in flight;
//! 3. run one budgeted scheduler slice.

use crate::config::Effective;
use crate::debounce::ChangeDebouncer;
use crate::error::{LintelError, Result, TaskError};
use crate::marshal::{DrainReport, TaskMarshaller, TaskSender};
use crate::models::change::{MoveBatch, RawEvent};
use crate::models::{IssueKey, TrackedPath};
use crate::registry::RuleRegistry;
use crate::scheduler::{AnalysisScheduler, Clock, PassReport, Phase, SystemClock, TickOutcome};
use crate::store::{Delta, IssueStore, SubscriptionId};
use crate::tracker::PathSetTracker;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, info};

/// Values injected into the engine. The engine never reads config files.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub analyzer: String,
    pub debounce: Duration,
    pub tick_budget: Duration,
}

impl EngineConfig {
    pub fn from_effective(eff: &Effective) -> Self {
        EngineConfig {
            analyzer: eff.analyzer.clone(),
            debounce: eff.debounce,
            tick_budget: eff.tick_budget,
        }
    }
}

/// State owned by the execution thread; marshalled tasks receive `&mut` to it.
pub struct EngineCore<C: Clock = SystemClock> {
    tracker: PathSetTracker,
    debouncer: ChangeDebouncer<RawEvent>,
    scheduler: AnalysisScheduler<C>,
    store: IssueStore,
    registry: RuleRegistry,
}

impl<C: Clock> EngineCore<C> {
    /// Feed one raw event into the debouncer.
    pub fn notify(&mut self, event: RawEvent) {
        let now = self.scheduler.clock().now();
        self.debouncer.notify_at(event, now);
    }

    pub fn tracker(&self) -> &PathSetTracker {
        &self.tracker
    }

    pub fn store(&self) -> &IssueStore {
        &self.store
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    fn apply_settled(&mut self, events: Vec<RawEvent>) {
        debug!(events = events.len(), "debounced batch settled");
        let changes = self.tracker.apply_all(events);
        if changes.is_empty() {
            return;
        }
        let gone = changes.invalidated();
        if !gone.is_empty() {
            self.store.invalidate(gone.iter().cloned());
        }
        let mut scope: BTreeSet<TrackedPath> = changes.affected();
        let dependents = self
            .registry
            .dependents(scope.iter().chain(gone.iter()), self.tracker.iter());
        if !dependents.is_empty() {
            debug!(count = dependents.len(), "re-checking dependent paths");
            scope.extend(dependents);
        }
        if let Some(in_flight) = self.scheduler.discard() {
            scope.extend(in_flight);
        }
        scope.retain(|p| self.tracker.contains(p));
        if !scope.is_empty() {
            self.scheduler.start_pass(scope, &self.registry);
        }
    }
}

/// Cloneable, `Send` producer side of the engine.
pub struct EngineHandle<C: Clock = SystemClock> {
    tx: TaskSender<EngineCore<C>>,
}

impl<C: Clock> Clone for EngineHandle<C> {
    fn clone(&self) -> Self {
        EngineHandle {
            tx: self.tx.clone(),
        }
    }
}

impl<C: Clock + 'static> EngineHandle<C> {
    /// Report one raw filesystem event.
    pub fn submit(&self, event: RawEvent) -> Result<()> {
        self.tx.enqueue(move |core: &mut EngineCore<C>| {
            core.notify(event);
            Ok(())
        })
    }

    /// Report an import-callback batch; pairing is validated on the execution thread.
    pub fn submit_batch(&self, batch: MoveBatch) -> Result<()> {
        self.tx.enqueue(move |core: &mut EngineCore<C>| {
            for event in batch.into_events() {
                core.notify(event);
            }
            Ok(())
        })
    }

    /// Run an arbitrary closure on the execution thread during the next tick.
    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut EngineCore<C>) -> std::result::Result<(), TaskError> + Send + 'static,
    {
        self.tx.enqueue(task)
    }
}

pub struct Engine<C: Clock = SystemClock> {
    config: EngineConfig,
    core: EngineCore<C>,
    marshaller: TaskMarshaller<EngineCore<C>>,
    running: bool,
}

impl<C: Clock> std::fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("running", &self.running)
            .field("tracked", &self.core.tracker.len())
            .field("issues", &self.core.store.len())
            .field("phase", &self.core.scheduler.phase())
            .finish()
    }
}

impl Engine<SystemClock> {
    pub fn new(
        config: EngineConfig,
        registry: RuleRegistry,
        in_scope: impl Fn(&str) -> bool + Send + 'static,
    ) -> Self {
        Self::with_clock(config, registry, in_scope, SystemClock)
    }
}

impl<C: Clock + 'static> Engine<C> {
    pub fn with_clock(
        config: EngineConfig,
        registry: RuleRegistry,
        in_scope: impl Fn(&str) -> bool + Send + 'static,
        clock: C,
    ) -> Self {
        let marshaller = TaskMarshaller::new();
        // producers are refused until start
        marshaller.close();
        Engine {
            core: EngineCore {
                tracker: PathSetTracker::new(in_scope),
                debouncer: ChangeDebouncer::new(config.debounce),
                scheduler: AnalysisScheduler::with_clock(clock),
                store: IssueStore::new(config.analyzer.clone()),
                registry,
            },
            config,
            marshaller,
            running: false,
        }
    }

    /// Seed the tracked set and begin a full pass. Restarting a running engine
    /// re-seeds it.
    pub fn start<I, S>(&mut self, initial_paths: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackedPath>,
    {
        self.core.debouncer.clear();
        self.core.tracker.initialize(initial_paths);
        let stale: Vec<TrackedPath> = self
            .core
            .store
            .issues()
            .map(|i| i.path.clone())
            .filter(|p| !self.core.tracker.contains(p))
            .collect();
        if !stale.is_empty() {
            self.core.store.invalidate(stale);
        }
        let pass = self
            .core
            .scheduler
            .start_pass(self.core.tracker.snapshot(), &self.core.registry);
        self.marshaller.reopen();
        self.running = true;
        info!(
            analyzer = %self.config.analyzer,
            tracked = self.core.tracker.len(),
            rules = self.core.registry.len(),
            "engine started"
        );
        pass
    }

    /// Stop accepting work and abandon anything in flight. Stored issues stay.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.marshaller.close();
        let dropped = self.marshaller.clear();
        self.core.scheduler.discard();
        self.core.debouncer.clear();
        info!(dropped_tasks = dropped, "engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn handle(&self) -> EngineHandle<C> {
        EngineHandle {
            tx: self.marshaller.sender(),
        }
    }

    /// One host-loop iteration. See the module docs for the order of work.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if !self.running {
            return Err(LintelError::NotRunning);
        }
        let DrainReport { failed, .. } = self.marshaller.drain(&mut self.core)?;
        if failed > 0 {
            debug!(failed, "some marshalled tasks failed");
        }
        let now = self.core.scheduler.clock().now();
        if let Some(events) = self.core.debouncer.poll_at(now) {
            self.core.apply_settled(events);
        }
        Ok(self
            .core
            .scheduler
            .tick(self.config.tick_budget, &mut self.core.store))
    }

    /// Whether anything is queued, debouncing or scanning.
    pub fn is_busy(&self) -> bool {
        self.marshaller.pending() > 0
            || self.core.debouncer.is_pending()
            || self.core.scheduler.phase() == Phase::Scanning
    }

    /// Tick until the current work settles.
    ///
    /// Returns the report of the last pass to settle, or `None` when there
    /// was nothing to do. Pending debounced events are waited out on a clock
    /// that runs by itself. On a clock that does not (`ManualClock`) the call
    /// returns as soon as only the quiet period is left; advance the clock
    /// and call again.
    pub fn run_until_settled(&mut self) -> Result<Option<PassReport>> {
        let mut last = None;
        loop {
            match self.tick()? {
                TickOutcome::Settled(report) => last = Some(report),
                TickOutcome::Yielded { .. } => {}
                TickOutcome::Idle => {
                    if !self.is_busy() {
                        return Ok(last);
                    }
                    if self.marshaller.pending() > 0 {
                        continue;
                    }
                    let Some(deadline) = self.core.debouncer.deadline() else {
                        std::thread::yield_now();
                        continue;
                    };
                    if !self.clock().runs_by_itself() {
                        return Ok(last);
                    }
                    let wait = deadline.saturating_duration_since(self.clock().now());
                    std::thread::sleep(wait);
                }
            }
        }
    }

    /// Run the fix of the issue identified by `key`. The issue remains until
    /// a later pass over its path confirms it is gone.
    pub fn fix(&self, key: &IssueKey) -> Option<bool> {
        self.core.store.apply_fix(key)
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&str, &Delta) + Send + 'static,
    ) -> SubscriptionId {
        self.core.store.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.core.store.unsubscribe(id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn core(&self) -> &EngineCore<C> {
        &self.core
    }

    pub fn store(&self) -> &IssueStore {
        &self.core.store
    }

    pub fn tracker(&self) -> &PathSetTracker {
        &self.core.tracker
    }

    pub fn phase(&self) -> Phase {
        self.core.scheduler.phase()
    }

    pub fn clock(&self) -> &C {
        self.core.scheduler.clock()
    }
}
