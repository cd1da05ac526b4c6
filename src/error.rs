//! Error types shared across the engine and its host surfaces.
//!
//! Nothing in the tracking/scheduling core is fatal: rule, task and fix
//! failures are logged and degraded where they happen. `LintelError` covers
//! the remaining setup-time failures (config, patterns, registration,
//! watcher) plus the two runtime refusals of a stopped engine.

use thiserror::Error;

/// Errors surfaced by configuration, registration and engine lifecycle.
#[derive(Error, Debug)]
pub enum LintelError {
    /// Reading a config file failed.
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A config file exists but could not be parsed.
    #[error("invalid config {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// An include/ignore glob is malformed.
    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// A rule's configuration is unusable (unknown convention, bad regex...).
    #[error("invalid configuration for rule '{rule}': {message}")]
    RuleConfig { rule: String, message: String },

    /// A rule id was registered twice.
    #[error("rule '{0}' is already registered")]
    DuplicateRule(String),

    /// The filesystem watcher could not be created or attached.
    #[error("file watching error: {0}")]
    Watch(String),

    /// The marshaller no longer accepts tasks.
    #[error("task queue is closed")]
    QueueClosed,

    /// `drain` was called from a thread other than the execution thread.
    #[error("task queue drained from a foreign thread")]
    ForeignThread,

    /// The engine was ticked or fed before `start` or after `stop`.
    #[error("engine is not running")]
    NotRunning,
}

/// Failure reported by a single rule evaluation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RuleError(pub String);

impl From<std::io::Error> for RuleError {
    fn from(e: std::io::Error) -> Self {
        RuleError(e.to_string())
    }
}

/// Failure reported by a marshalled task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TaskError(pub String);

pub type Result<T> = std::result::Result<T, LintelError>;
