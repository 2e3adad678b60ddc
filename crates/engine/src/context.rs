use std::sync::Arc;

use crate::error::RemoteError;
use crate::pool::{CancelToken, WorkerPool};
use crate::retry::{attempt_until_cancelled, RetryFailure, RetryPolicy, Sleeper, ThreadSleeper};

/// Everything a pipeline run needs besides its collaborators.
///
/// Created per invocation and passed by reference into each stage.
#[derive(Clone)]
pub struct RunContext {
    pub retry: RetryPolicy,
    pub sleeper: Arc<dyn Sleeper>,
    pub pool: WorkerPool,
    pub cancel: CancelToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
            pool: WorkerPool::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl RunContext {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pool = WorkerPool::new(workers);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// One remote call under this run's retry policy. Backoff waits end
    /// early once the run is cancelled.
    pub fn attempt<T>(
        &self,
        what: &str,
        call: impl FnMut(u32) -> Result<T, RemoteError>,
    ) -> Result<T, RetryFailure> {
        attempt_until_cancelled(&self.retry, self.sleeper.as_ref(), &self.cancel, what, call)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("retry", &self.retry)
            .field("pool", &self.pool)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
