//! Fixed-size worker pool for independent analysis tasks
//!
//! Work items are queued on a crossbeam channel and drained by scoped worker
//! threads, so tasks may borrow the tables and stores of the caller. A task
//! that fails or panics is logged and counted; the remaining items still run.

use crate::error::{AnalysisError, Result};
use crossbeam::channel;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What a task did with its item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The item was computed and its result delivered
    Done,
    /// Nothing to do (already stored, degenerate input)
    Skipped,
}

/// Counters of a finished pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PoolSummary {
    pub fn total(&self) -> usize {
        self.done + self.skipped + self.failed
    }
}

impl fmt::Display for PoolSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} skipped, {} failed",
            self.done, self.skipped, self.failed
        )
    }
}

#[derive(Default)]
struct Counters {
    done: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

/// Run `task` over `items` on `workers` threads
///
/// Items complete in any order. Blocks until every item was handled.
///
/// # Errors
/// Only when a worker thread itself cannot be joined; task failures are
/// counted in the summary instead.
pub fn run<T, F>(workers: usize, items: Vec<T>, task: F) -> Result<PoolSummary>
where
    T: Send + fmt::Display,
    F: Fn(&T) -> Result<Outcome> + Sync,
{
    let workers = workers.max(1).min(items.len().max(1));
    let (sender, receiver) = channel::unbounded();
    for item in items {
        // The receiver is alive until the scope below ends
        let _ = sender.send(item);
    }
    drop(sender);

    let counters = Counters::default();
    crossbeam::scope(|scope| {
        for _ in 0..workers {
            let receiver = receiver.clone();
            let task = &task;
            let counters = &counters;
            scope.spawn(move |_| {
                while let Ok(item) = receiver.recv() {
                    match panic::catch_unwind(AssertUnwindSafe(|| task(&item))) {
                        Ok(Ok(Outcome::Done)) => {
                            counters.done.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Ok(Outcome::Skipped)) => {
                            counters.skipped.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(e)) => {
                            tracing::warn!("Task for {} failed: {}", item, e);
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            tracing::warn!("Task for {} panicked", item);
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    })
    .map_err(|_| AnalysisError::Worker("worker thread could not be joined".to_string()))?;

    Ok(PoolSummary {
        done: counters.done.into_inner(),
        skipped: counters.skipped.into_inner(),
        failed: counters.failed.into_inner(),
    })
}
