//! Worker supervisor.
//!
//! Every long-running listener (keypad, secret pipe, each sensor) runs as a
//! named task in one [`JoinSet`]. Workers are expected to run until they are
//! cancelled, so any worker that ends on its own is reported to the caller,
//! which treats it as fatal.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use warden_core::{Error, Result};

/// How a worker task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTermination {
    /// Returned `Ok`.
    Success,
    /// Returned an error.
    Error,
    /// Was aborted.
    Cancelled,
    /// Panicked.
    Panic,
}

/// A worker that has ended.
#[derive(Debug)]
pub struct WorkerExit {
    pub name: String,
    pub termination: TaskTermination,
    pub error: Option<Error>,
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.termination, &self.error) {
            (_, Some(error)) => write!(f, "worker {} failed: {error}", self.name),
            (TaskTermination::Panic, None) => write!(f, "worker {} panicked", self.name),
            (TaskTermination::Cancelled, None) => write!(f, "worker {} was aborted", self.name),
            _ => write!(f, "worker {} stopped", self.name),
        }
    }
}

/// Termination counts collected by [`Supervisor::shutdown`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub success: usize,
    pub errors: usize,
    pub cancelled: usize,
    pub panics: usize,
    /// Workers that ignored cancellation and had to be aborted.
    pub aborted: usize,
}

impl ShutdownReport {
    fn record(&mut self, termination: TaskTermination) {
        match termination {
            TaskTermination::Success => self.success += 1,
            TaskTermination::Error => self.errors += 1,
            TaskTermination::Cancelled => self.cancelled += 1,
            TaskTermination::Panic => self.panics += 1,
        }
    }

    /// Whether every worker stopped cleanly.
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.panics == 0 && self.aborted == 0
    }
}

/// Owner of all worker tasks.
pub struct Supervisor {
    tasks: JoinSet<Result<()>>,
    names: HashMap<Id, String>,
    cancel: CancellationToken,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            names: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Token for a new worker. Cancelled when the supervisor shuts down.
    pub fn token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Spawn a named worker.
    pub fn spawn<F>(&mut self, name: impl Into<String>, worker: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        let handle = self.tasks.spawn(worker);
        debug!(worker = %name, "Worker spawned");
        self.names.insert(handle.id(), name);
    }

    /// Number of workers still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next worker to end.
    ///
    /// Returns `None` once no workers are left. Cancel-safe.
    pub async fn next_exit(&mut self) -> Option<WorkerExit> {
        let result = self.tasks.join_next_with_id().await?;
        Some(self.classify(result))
    }

    /// Cancel every worker and wait for them to end.
    ///
    /// Workers still running after `timeout` are aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> ShutdownReport {
        self.cancel.cancel();
        let mut report = ShutdownReport::default();

        let drained = tokio::time::timeout(timeout, async {
            while let Some(result) = self.tasks.join_next_with_id().await {
                let exit = self.classify(result);
                log_exit(&exit);
                report.record(exit.termination);
            }
        })
        .await;

        if drained.is_err() {
            report.aborted = self.tasks.len();
            warn!(remaining = report.aborted, "Workers did not stop in time, aborting");
            self.tasks.abort_all();
            while let Some(result) = self.tasks.join_next_with_id().await {
                let exit = self.classify(result);
                report.record(exit.termination);
            }
        }

        info!(
            success = report.success,
            errors = report.errors,
            cancelled = report.cancelled,
            panics = report.panics,
            aborted = report.aborted,
            "Workers stopped"
        );
        report
    }

    fn classify(&mut self, result: std::result::Result<(Id, Result<()>), JoinError>) -> WorkerExit {
        let (id, termination, error) = match result {
            Ok((id, Ok(()))) => (id, TaskTermination::Success, None),
            Ok((id, Err(e))) => (id, TaskTermination::Error, Some(e)),
            Err(e) if e.is_cancelled() => (e.id(), TaskTermination::Cancelled, None),
            Err(e) => (e.id(), TaskTermination::Panic, None),
        };
        let name = self
            .names
            .remove(&id)
            .unwrap_or_else(|| format!("task-{id}"));

        WorkerExit {
            name,
            termination,
            error,
        }
    }
}

fn log_exit(exit: &WorkerExit) {
    match exit.termination {
        TaskTermination::Success | TaskTermination::Cancelled => {
            debug!(worker = %exit.name, termination = ?exit.termination, "Worker stopped");
        }
        TaskTermination::Error | TaskTermination::Panic => error!("{exit}"),
    }
}
