//! Fixed-size worker pool for part transfers.
//!
//! `N` workers share one unbounded FIFO queue. Each queued task is handed to
//! exactly one worker; a worker that finishes a task immediately takes the
//! next one, so a slow part only ties up its own worker.
//!
//! Every submitted task produces exactly one [`TaskReport`], keyed by the
//! task's index. The pool-wide result is a reduction over those reports: the
//! pool succeeded only if every submitted task succeeded. A failing or
//! panicking task never stops its worker from taking further tasks.
//!
//! Shutdown comes in two flavours:
//! - [`WorkerPool::drain_and_wait`] closes the queue, lets workers finish
//!   everything already queued, then joins them.
//! - [`WorkerPool::stop_now`] tells workers to stop taking new tasks. Tasks
//!   already running finish; anything still queued is reported as
//!   [`TaskOutcome::NotRun`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result, TransferError};

/// A unit of work the pool can execute.
///
/// The pool knows nothing about what a task does beyond its position in the
/// part sequence and whether `run` succeeded.
#[async_trait::async_trait]
pub trait Task: Send + Sync + 'static {
    /// Value produced on success (e.g. a part checksum)
    type Output: Send + 'static;

    /// Position of this task in the ordered part sequence
    fn index(&self) -> usize;

    /// Run to completion
    async fn run(&self) -> Result<Self::Output>;
}

/// How a single task ended.
#[derive(Debug)]
pub enum TaskOutcome<O> {
    /// `run` returned `Ok`
    Succeeded(O),
    /// `run` returned `Err`
    Failed(Error),
    /// `run` panicked; the payload message is kept
    Panicked(String),
    /// The pool was stopped before a worker picked the task up
    NotRun,
}

impl<O> TaskOutcome<O> {
    /// True for [`TaskOutcome::Succeeded`]
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    fn failure_message(&self) -> Option<String> {
        match self {
            TaskOutcome::Succeeded(_) => None,
            TaskOutcome::Failed(e) => Some(e.to_string()),
            TaskOutcome::Panicked(msg) => Some(format!("task panicked: {}", msg)),
            TaskOutcome::NotRun => Some("not run: pool stopped".to_string()),
        }
    }
}

/// Outcome of one task, tagged with its index.
#[derive(Debug)]
pub struct TaskReport<O> {
    /// Task index
    pub index: usize,
    /// How the task ended
    pub outcome: TaskOutcome<O>,
}

/// Aggregated outcome of every task submitted to a pool.
#[derive(Debug)]
pub struct PoolReport<O> {
    submitted: usize,
    reports: Vec<TaskReport<O>>,
}

impl<O> PoolReport<O> {
    /// Number of tasks that were submitted
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Per-task reports, sorted by index
    pub fn reports(&self) -> &[TaskReport<O>] {
        &self.reports
    }

    /// Number of submitted tasks that did not succeed (including lost reports)
    pub fn failed_count(&self) -> usize {
        let succeeded = self
            .reports
            .iter()
            .filter(|r| r.outcome.is_success())
            .count();
        self.submitted.saturating_sub(succeeded)
    }

    /// True iff every submitted task succeeded
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Lowest-indexed failure, if any
    pub fn first_failure(&self) -> Option<(usize, String)> {
        self.reports
            .iter()
            .find_map(|r| r.outcome.failure_message().map(|msg| (r.index, msg)))
    }

    /// Outputs in index order, or [`TransferError::PartsFailed`] if any task failed
    pub fn into_outputs(self) -> Result<Vec<O>> {
        if !self.is_success() {
            let first_error = match self.first_failure() {
                Some((index, msg)) => format!("part {}: {}", index, msg),
                None => "worker exited without reporting".to_string(),
            };
            return Err(TransferError::PartsFailed {
                failed: self.failed_count(),
                total: self.submitted,
                first_error,
            }
            .into());
        }

        Ok(self
            .reports
            .into_iter()
            .filter_map(|r| match r.outcome {
                TaskOutcome::Succeeded(output) => Some(output),
                _ => None,
            })
            .collect())
    }
}

type SharedQueue<T> = Arc<Mutex<mpsc::UnboundedReceiver<T>>>;

/// Fixed pool of workers consuming a shared FIFO task queue.
///
/// Must be created inside a tokio runtime. Dropping the pool without draining
/// it stops the workers after their current task.
pub struct WorkerPool<T: Task> {
    sender: Option<mpsc::UnboundedSender<T>>,
    queue: SharedQueue<T>,
    queued: Arc<AtomicUsize>,
    submitted: usize,
    stop: CancellationToken,
    workers: Vec<JoinHandle<Vec<TaskReport<T::Output>>>>,
}

impl<T: Task> WorkerPool<T> {
    /// Spawn `threads` workers (at least one)
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue: SharedQueue<T> = Arc::new(Mutex::new(receiver));
        let queued = Arc::new(AtomicUsize::new(0));
        let stop = CancellationToken::new();

        let workers = (0..threads)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&queue),
                    Arc::clone(&queued),
                    stop.clone(),
                ))
            })
            .collect();

        tracing::debug!(threads, "Worker pool started");

        Self {
            sender: Some(sender),
            queue,
            queued,
            submitted: 0,
            stop,
            workers,
        }
    }

    /// Number of workers
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task; returns the queue depth including this task
    ///
    /// Fails with [`TransferError::PoolClosed`] once the pool is stopping.
    pub fn submit(&mut self, task: T) -> Result<usize> {
        let sender = self.sender.as_ref().ok_or(TransferError::PoolClosed)?;
        if self.stop.is_cancelled() {
            return Err(TransferError::PoolClosed.into());
        }

        let depth = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
        if sender.send(task).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(TransferError::PoolClosed.into());
        }
        self.submitted += 1;
        Ok(depth)
    }

    /// Tasks queued but not yet picked up by a worker
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Close the queue, run everything already queued, and join all workers
    pub async fn drain_and_wait(mut self) -> PoolReport<T::Output> {
        // Workers see `None` from the channel once it is closed and empty.
        self.sender.take();
        self.join_all().await
    }

    /// Stop taking queued tasks, wait for running ones, and join all workers
    pub async fn stop_now(mut self) -> PoolReport<T::Output> {
        self.stop.cancel();
        self.sender.take();
        self.join_all().await
    }

    async fn join_all(&mut self) -> PoolReport<T::Output> {
        let mut reports = Vec::with_capacity(self.submitted);

        for (worker, handle) in std::mem::take(&mut self.workers).into_iter().enumerate() {
            match handle.await {
                Ok(mut worker_reports) => reports.append(&mut worker_reports),
                Err(e) => {
                    tracing::error!(worker, error = %e, "Worker exited abnormally");
                }
            }
        }

        // Anything still queued was never picked up (stop_now only).
        let mut queue = self.queue.lock().await;
        while let Ok(task) = queue.try_recv() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            reports.push(TaskReport {
                index: task.index(),
                outcome: TaskOutcome::NotRun,
            });
        }
        drop(queue);

        reports.sort_by_key(|r| r.index);

        let report = PoolReport {
            submitted: self.submitted,
            reports,
        };
        tracing::debug!(
            submitted = report.submitted,
            failed = report.failed_count(),
            "Worker pool finished"
        );
        report
    }
}

impl<T: Task> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn worker_loop<T: Task>(
    worker: usize,
    queue: SharedQueue<T>,
    queued: Arc<AtomicUsize>,
    stop: CancellationToken,
) -> Vec<TaskReport<T::Output>> {
    let mut reports = Vec::new();

    loop {
        let next = {
            let mut receiver = queue.lock().await;
            tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                task = receiver.recv() => task,
            }
        };

        let Some(task) = next else {
            break;
        };
        queued.fetch_sub(1, Ordering::SeqCst);

        let index = task.index();
        tracing::debug!(worker, part = index, "Task started");

        let outcome = match AssertUnwindSafe(task.run()).catch_unwind().await {
            Ok(Ok(output)) => TaskOutcome::Succeeded(output),
            Ok(Err(e)) => {
                tracing::warn!(worker, part = index, error = %e, "Task failed");
                TaskOutcome::Failed(e)
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!(worker, part = index, panic = %msg, "Task panicked");
                TaskOutcome::Panicked(msg)
            }
        };

        reports.push(TaskReport { index, outcome });
    }

    tracing::debug!(worker, tasks = reports.len(), "Worker exiting");
    reports
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
