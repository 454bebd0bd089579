//! Bounded-concurrency worker pool
//!
//! A [`Worker`] repeatedly spawns a task on the Tokio runtime while holding
//! at most `max_parallelism` invocations in flight. Two loop modes exist:
//!
//! - [`LoopMode::FixedCount`]: exactly `k` invocations with indices `0..k`
//! - [`LoopMode::UntilCancelled`]: unbounded, stops when the [`Cancellation`]
//!   fires
//!
//! The signal is checked before every spawn; an invocation that already
//! started is always allowed to finish. [`Worker::process`] returns once
//! every spawned invocation has returned.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::cancel::Cancellation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("max parallelism must be at least 1")]
    InvalidParallelism,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    FixedCount(usize),
    UntilCancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub max_parallelism: usize,
    pub mode: LoopMode,
}

pub struct Worker<F> {
    task: Arc<F>,
    options: WorkerOptions,
}

impl<F, Fut> Worker<F>
where
    F: Fn(Cancellation, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn new(task: F, options: WorkerOptions) -> Result<Self, WorkerError> {
        if options.max_parallelism == 0 {
            return Err(WorkerError::InvalidParallelism);
        }
        Ok(Self {
            task: Arc::new(task),
            options,
        })
    }

    /// Run until the loop mode is exhausted or `ctx` fires, then wait for
    /// in-flight invocations. Returns the number of invocations started.
    pub async fn process(&self, ctx: &Cancellation) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.options.max_parallelism));
        let mut tasks = JoinSet::new();
        let mut started = 0usize;

        loop {
            if let LoopMode::FixedCount(count) = self.options.mode
                && started >= count
            {
                break;
            }
            if ctx.is_cancelled() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            // The wait for a permit may have outlived the deadline
            if ctx.is_cancelled() {
                break;
            }

            let task = Arc::clone(&self.task);
            let task_ctx = ctx.clone();
            let index = started;
            tasks.spawn(async move {
                let _permit = permit;
                task(task_ctx, index).await;
            });
            started += 1;

            while let Some(result) = tasks.try_join_next() {
                log_join_result(result);
            }
        }

        while let Some(result) = tasks.join_next().await {
            log_join_result(result);
        }

        debug!(
            "Worker finished: {} invocations (mode={:?}, parallelism={})",
            started, self.options.mode, self.options.max_parallelism
        );
        started
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Worker invocation did not complete: {}", e);
    }
}
