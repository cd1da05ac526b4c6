//! Live mode: a `notify` watcher feeding the engine from its own thread.
//!
//! The watcher callback converts each notification into root-relative
//! `RawEvent`s and submits them through an `EngineHandle`. The calling
//! thread is the execution thread: it ticks the engine, which prints deltas
//! through its subscriber, then sleeps for the configured poll interval.

use crate::config::Effective;
use crate::engine::EngineHandle;
use crate::error::{LintelError, Result};
use crate::lint::build_engine;
use crate::models::change::RawEvent;
use crate::output::print_delta;
use crate::tracker::{scan_dir, scan_tree, ScopeFilter};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Events for a path that just appeared. A directory that arrives in one
/// notification (created with content, or moved in from outside the root)
/// expands to a create for every in-scope file beneath it.
fn appeared(path: &Path, filter: &ScopeFilter) -> Vec<RawEvent> {
    let Some(rel) = filter.relativize(path) else {
        return Vec::new();
    };
    if filter.root().join(&rel).is_dir() {
        return match scan_dir(filter, &rel) {
            Ok(files) => files.into_iter().map(RawEvent::Created).collect(),
            Err(e) => {
                warn!(dir = %rel, error = %e, "cannot enumerate new directory");
                Vec::new()
            }
        };
    }
    if filter.matches(&rel) {
        vec![RawEvent::Created(rel)]
    } else {
        Vec::new()
    }
}

/// Translate one notification into tracker events, dropping paths outside
/// the root or the include/ignore patterns.
pub fn to_raw_events(event: &Event, filter: &ScopeFilter) -> Vec<RawEvent> {
    let rel = |p: &Path| filter.relativize(p);
    let wanted = |p: &String| filter.matches(p);
    let each = |make: fn(String) -> RawEvent| -> Vec<RawEvent> {
        event
            .paths
            .iter()
            .filter_map(|p| rel(p.as_path()))
            .filter(|p| wanted(p))
            .map(make)
            .collect()
    };
    let appearing = || -> Vec<RawEvent> {
        event
            .paths
            .iter()
            .flat_map(|p| appeared(p, filter))
            .collect()
    };
    match &event.kind {
        EventKind::Create(_) => appearing(),
        EventKind::Remove(_) => each(RawEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let (Some(from_abs), Some(to_abs)) = (event.paths.first(), event.paths.get(1)) else {
                return Vec::new();
            };
            let (Some(from), Some(to)) = (rel(from_abs.as_path()), rel(to_abs.as_path())) else {
                return Vec::new();
            };
            if filter.root().join(&to).is_dir() {
                // tracked children move with the rename; untracked ones surface as creates
                let mut out = vec![RawEvent::Renamed { from, to }];
                out.extend(appeared(to_abs, filter));
                out
            } else if wanted(&from) || wanted(&to) {
                vec![RawEvent::Renamed { from, to }]
            } else {
                Vec::new()
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(RawEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => appearing(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .flat_map(|p| {
                if p.exists() {
                    appeared(p, filter)
                } else {
                    rel(p.as_path())
                        .filter(|r| wanted(r))
                        .map(RawEvent::Deleted)
                        .into_iter()
                        .collect()
                }
            })
            .collect(),
        EventKind::Modify(_) => each(RawEvent::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Start a recursive watcher on the filter's root that submits into `handle`.
///
/// Dropping the returned watcher stops the feed.
pub fn attach(filter: &ScopeFilter, handle: EngineHandle) -> Result<RecommendedWatcher> {
    let scope = filter.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for raw in to_raw_events(&event, &scope) {
                if let Err(e) = handle.submit(raw) {
                    debug!(error = %e, "engine no longer accepts events");
                }
            }
        }
        Err(e) => warn!(error = %e, "watch error"),
    })
    .map_err(|e| LintelError::Watch(format!("failed to create watcher: {}", e)))?;
    watcher
        .watch(filter.root(), RecursiveMode::Recursive)
        .map_err(|e| LintelError::Watch(format!("failed to watch {}: {}", filter.root().display(), e)))?;
    info!(root = %filter.root().display(), "watching for changes");
    Ok(watcher)
}

/// Run the live loop until `exit_after` elapses (forever when `None`).
pub fn run_watch(eff: &Effective, exit_after: Option<Duration>) -> Result<()> {
    let mut eff = eff.clone();
    // notify reports absolute paths
    eff.repo_root = fs::canonicalize(&eff.repo_root).map_err(|e| {
        LintelError::Watch(format!("cannot resolve {}: {}", eff.repo_root.display(), e))
    })?;
    let (mut engine, filter) = build_engine(&eff)?;
    let output = eff.output.clone();
    engine.subscribe(move |analyzer, delta| print_delta(analyzer, delta, &output));

    engine.start(scan_tree(&filter)?);
    let _watcher = attach(&filter, engine.handle())?;

    let started = Instant::now();
    loop {
        engine.tick()?;
        if exit_after.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(eff.poll);
    }
    engine.stop();
    Ok(())
}
