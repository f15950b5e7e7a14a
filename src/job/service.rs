//! Local job executor
//!
//! [`JobService`] runs jobs on the current node. Every offered job gets its own
//! task; a semaphore bounds how many run at the same time. The service holds a
//! weak reference to the [`ClusterContext`] it belongs to, attached once the
//! context is fully built. Jobs offered before that fail with an application
//! failure instead of running against a half-started node.
//!
//! A job offered by another job already running on the same service runs
//! under its parent's permit. The parent waits on the child, so taking a
//! second permit could exhaust the semaphore with parents only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::future::ResultFuture;
use super::{Job, JobFailure, JobOutcome};
use crate::cluster::ClusterContext;

tokio::task_local! {
    /// Identity of the service whose job the current task is running
    static RUNNING_ON: usize;
}

/// Anything that can accept a job for execution on this node
pub trait LocalExecutor: Send + Sync {
    /// Hand a job over for asynchronous execution
    fn offer(&self, job: Arc<dyn Job>) -> ResultFuture<JobOutcome>;
}

/// Bounded local executor backed by tokio tasks
#[derive(Debug)]
pub struct JobService {
    context: OnceLock<Weak<ClusterContext>>,
    permits: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
}

impl JobService {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            context: OnceLock::new(),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the service to its cluster context; later calls are ignored
    pub fn attach(&self, context: &Arc<ClusterContext>) {
        if self.context.set(Arc::downgrade(context)).is_err() {
            warn!("Job service already attached to a cluster context");
        }
    }

    /// Number of jobs currently executing
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop accepting work; queued jobs complete with a failure
    pub fn shutdown(&self) {
        self.permits.close();
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.permits) as usize
    }

    /// Whether the caller is a job running on this service
    fn offered_from_own_job(&self) -> bool {
        RUNNING_ON
            .try_with(|id| *id == self.identity())
            .unwrap_or(false)
    }
}

impl LocalExecutor for JobService {
    fn offer(&self, job: Arc<dyn Job>) -> ResultFuture<JobOutcome> {
        let (completer, future) = ResultFuture::pending();
        let context = self.context.get().cloned();
        let permits = Arc::clone(&self.permits);
        let running = Arc::clone(&self.running);
        let identity = self.identity();
        let nested = self.offered_from_own_job();

        tokio::spawn(async move {
            let _permit = if nested {
                None
            } else {
                match permits.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        let _ = completer.complete(Err(JobFailure::new("job service is shut down")));
                        return;
                    }
                }
            };

            if completer.is_cancelled() {
                debug!(job = job.name(), "Skipping cancelled job");
                return;
            }

            let Some(ctx) = context.and_then(|weak| weak.upgrade()) else {
                let _ = completer.complete(Err(JobFailure::new("node is still starting")));
                return;
            };

            debug!(job = job.name(), scheduled = job.is_scheduled(), nested, "Running job");
            running.fetch_add(1, Ordering::Relaxed);
            let outcome = RUNNING_ON.scope(identity, job.run(&ctx)).await;
            running.fetch_sub(1, Ordering::Relaxed);

            if let Err(outcome) = completer.complete(outcome) {
                debug!(job = job.name(), ?outcome, "Discarding result of cancelled job");
            }
        });

        future
    }
}
