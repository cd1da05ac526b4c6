//! Cross-thread task handoff onto the execution thread.
//!
//! Producers on any thread `enqueue` closures; the execution thread runs
//! them with `drain`, once per host tick, giving each task mutable access to
//! the state it owns. Tasks from one producer run in the order they were
//! enqueued. Each task runs inside its own fault boundary: an error or panic
//! is logged and the drain carries on with the next task.

use crate::error::{LintelError, Result, TaskError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use tracing::{debug, error};

type Task<C> = Box<dyn FnOnce(&mut C) -> std::result::Result<(), TaskError> + Send>;

/// Counts from one `drain` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub ran: usize,
    pub failed: usize,
}

/// Producer handle. Cheap to clone and safe to move to other threads.
pub struct TaskSender<C> {
    tx: flume::Sender<Task<C>>,
    closed: Arc<AtomicBool>,
}

impl<C> Clone for TaskSender<C> {
    fn clone(&self) -> Self {
        TaskSender {
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<C> std::fmt::Debug for TaskSender<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSender")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<C> TaskSender<C> {
    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut C) -> std::result::Result<(), TaskError> + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LintelError::QueueClosed);
        }
        self.tx
            .send(Box::new(task))
            .map_err(|_| LintelError::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// FIFO queue of closures over a context `C` owned by the execution thread.
pub struct TaskMarshaller<C> {
    sender: TaskSender<C>,
    rx: flume::Receiver<Task<C>>,
    owner: OnceLock<ThreadId>,
}

impl<C> std::fmt::Debug for TaskMarshaller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMarshaller")
            .field("pending", &self.rx.len())
            .field("closed", &self.sender.is_closed())
            .field("owner", &self.owner.get())
            .finish()
    }
}

impl<C> Default for TaskMarshaller<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TaskMarshaller<C> {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        TaskMarshaller {
            sender: TaskSender {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
            owner: OnceLock::new(),
        }
    }

    pub fn sender(&self) -> TaskSender<C> {
        self.sender.clone()
    }

    pub fn enqueue<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&mut C) -> std::result::Result<(), TaskError> + Send + 'static,
    {
        self.sender.enqueue(task)
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Refuse further tasks. Queued tasks can still be drained or cleared.
    pub fn close(&self) {
        self.sender.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Re-open a closed queue (engine restart).
    pub fn reopen(&self) {
        self.sender.closed.store(false, Ordering::SeqCst);
    }

    /// Drop queued tasks without running them. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.drain().count()
    }

    /// Run every task queued at the moment of the call.
    ///
    /// The first thread to drain becomes the execution thread; draining from
    /// any other thread afterwards fails with `ForeignThread`. Tasks enqueued
    /// while draining wait for the next call.
    pub fn drain(&self, ctx: &mut C) -> Result<DrainReport> {
        let me = thread::current().id();
        if *self.owner.get_or_init(|| me) != me {
            return Err(LintelError::ForeignThread);
        }
        let mut report = DrainReport::default();
        let queued = self.rx.len();
        for task in self.rx.try_iter().take(queued) {
            report.ran += 1;
            match catch_unwind(AssertUnwindSafe(|| task(ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(error = %e, "marshalled task failed");
                }
                Err(_) => {
                    report.failed += 1;
                    error!("marshalled task panicked");
                }
            }
        }
        if report.ran > 0 {
            debug!(ran = report.ran, failed = report.failed, "task queue drained");
        }
        Ok(report)
    }
}
