//! Lintel core library.
//!
//! An incremental linting engine for asset trees: it tracks the in-scope file
//! set, debounces filesystem notifications, re-evaluates only affected paths
//! in time-budgeted ticks, and publishes issue deltas.
//!
//! High-level modules:
//! - `tracker`: Authoritative tracked path set and scope filtering.
//! - `debounce`: Quiet-period coalescing of raw notifications.
//! - `registry`: The `Rule` contract and entity-scoped rule lookup.
//! - `scheduler`: Cooperative, resumable analysis passes.
//! - `store`: Current issues per analyzer with delta emission.
//! - `marshal`: Cross-thread task queue onto the execution thread.
//! - `engine`: Lifecycle object wiring the above together.
//! - `rules`: Built-in asset rules.
//! - `lint` / `watch`: One-shot and live host loops.
//! - `cli`, `config`, `output`: CLI parsing, configuration and printers.
//! - `models`, `error`: Shared data models and error types.
pub mod cli;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod lint;
pub mod marshal;
pub mod models;
pub mod output;
pub mod registry;
pub mod rules;
pub mod scheduler;
pub mod store;
pub mod tracker;
pub mod watch;
