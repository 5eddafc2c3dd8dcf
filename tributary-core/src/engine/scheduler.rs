//! Delivery Schedulers
//!
//! A scheduler decides where published states reach subscribers. The fold
//! runs on the engine's pipeline task; the scheduler takes each delivery as
//! a job and runs it, in order, on its own execution context.
//!
//! # Ordering
//!
//! Jobs must run in the order they were scheduled. Deliveries, failures
//! and completion all go through the same scheduler, so a subscriber never
//! sees the terminal event before the last state.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::logger::{SharedLogger, TracingLogger};

/// A unit of delivery work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs delivery jobs in the order they are scheduled.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, job: Job);
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, job: Job) {
        job();
    }
}

/// Runs jobs one at a time on a dedicated task of a tokio runtime.
///
/// This decouples the thread triggering events and folding states from the
/// one consuming them, the way a UI thread is kept apart from background
/// work.
pub struct SerialScheduler {
    jobs: mpsc::UnboundedSender<Job>,
    logger: SharedLogger,
}

impl SerialScheduler {
    /// Spawn the worker task on `runtime`.
    pub fn new(runtime: &Handle) -> Self {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();
        runtime.spawn(async move {
            while let Some(job) = queue.recv().await {
                job();
            }
        });
        Self {
            jobs,
            logger: Arc::new(TracingLogger),
        }
    }

    /// Report dropped deliveries to `logger`.
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }
}

impl Scheduler for SerialScheduler {
    fn schedule(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            self.logger
                .log("serial-scheduler", "Worker is gone, dropping a delivery");
        }
    }
}

impl fmt::Debug for SerialScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialScheduler")
            .field("running", &!self.jobs.is_closed())
            .finish()
    }
}
