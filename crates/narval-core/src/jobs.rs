//! Parallel job runner
//!
//! Jobs are spawned as soon as they are added. [`JobRunner::join`] waits for
//! every job, then reports the first failure in completion order.

use std::any::Any;
use std::future::Future;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

/// Why a job did not succeed
#[derive(Debug, Error)]
pub enum JobError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job cancelled")]
    Cancelled,
}

pub type JobResult<E> = Result<(), JobError<E>>;

/// Runs independent fallible jobs concurrently.
///
/// `join` consumes the runner, so it can only be called once and no job can
/// be added afterwards.
pub struct JobRunner<E> {
    set: JoinSet<Result<(), E>>,
    added: usize,
}

impl<E: Send + 'static> JobRunner<E> {
    pub fn new() -> Self {
        Self {
            set: JoinSet::new(),
            added: 0,
        }
    }

    /// Schedule a job immediately on the current runtime
    pub fn add<F, Fut>(&mut self, job: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.added += 1;
        self.set.spawn(async move { job().await });
    }

    /// Number of jobs added so far
    pub fn len(&self) -> usize {
        self.added
    }

    pub fn is_empty(&self) -> bool {
        self.added == 0
    }

    /// Wait for all jobs. Returns the first error to arrive, if any.
    pub async fn join(mut self) -> JobResult<E> {
        let mut first: Option<JobError<E>> = None;
        let mut failures = 0usize;

        while let Some(joined) = self.set.join_next().await {
            let outcome = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => JobError::Failed(e),
                Err(e) => from_join_error(e),
            };
            failures += 1;
            if first.is_none() {
                first = Some(outcome);
            }
        }

        debug!(jobs = self.added, failures, "Jobs joined");
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<E: Send + 'static> Default for JobRunner<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn from_join_error<E>(err: JoinError) -> JobError<E> {
    if err.is_panic() {
        let message = panic_message(&*err.into_panic());
        warn!(message = %message, "Job panicked");
        JobError::Panicked(message)
    } else {
        JobError::Cancelled
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
