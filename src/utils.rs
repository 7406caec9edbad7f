use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::warn;

use crate::dynamodb::Result;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 10;
/// Default wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Async sleep used between retries; swapped out in tests.
pub type Sleeper = Arc<dyn Fn(Duration) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fixed-delay retry policy for throttled requests.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    delay: Duration,
    sleeper: Sleeper,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Retries up to `max_retries` times, sleeping `delay` with tokio in between.
    pub fn new(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            sleeper: Arc::new(|d: Duration| tokio::time::sleep(d).boxed()),
        }
    }

    /// Replaces the sleep function.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Returns the maximum number of retries.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns the delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `operation`, retrying only throttling errors.
    ///
    /// Gives up after `max_retries` retries and returns the last throttling error. Any
    /// other error is returned straight away.
    pub async fn run<T, Fut, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_throttling() && retries < self.max_retries => {
                    retries += 1;
                    warn!(
                        "Request throttled: {}. Retrying in {:?} (attempt {}/{})",
                        e, self.delay, retries, self.max_retries
                    );
                    (self.sleeper)(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
