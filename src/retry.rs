//! Retry utilities with deadline-bounded exponential backoff.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::trace;

/// Retry policy shared by every adapter call (download, compose, delete).
///
/// Unlike a simple "double the interval until N errors" policy, this one is
/// bounded by wall-clock deadline rather than attempt count, and caps the
/// backoff interval so a flaky call keeps retrying at a bounded cadence
/// instead of backing off into minutes-long sleeps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    deadline: Duration,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(300),
            initial_delay: Duration::from_secs_f64(1.0),
            multiplier: 1.2,
            max_delay: Duration::from_secs(45),
        }
    }
}

impl RetryPolicy {
    /// Set the total wall-clock deadline across all attempts.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the delay before the first retry.
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set the backoff multiplier applied after each retry.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the cap on the backoff delay between attempts.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// The status of one attempt inside a [`wait`] loop.
#[derive(Debug)]
pub enum WaitStatus<T, E> {
    /// The operation finished successfully.
    Finished(T),
    /// The operation failed, but may succeed if retried.
    FailedTemporarily(E),
    /// The operation failed in a way that will not improve with retries.
    FailedPermanently(E),
}

/// Retry an async operation under `policy` until it finishes, fails
/// permanently, or the deadline elapses.
pub async fn wait<T, E, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WaitStatus<T, E>>,
{
    let start = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempt = 0u32;

    loop {
        match f().await {
            WaitStatus::Finished(result) => return Ok(result),
            WaitStatus::FailedPermanently(err) => return Err(err),
            WaitStatus::FailedTemporarily(err) => {
                attempt += 1;
                if start.elapsed() + delay >= policy.deadline {
                    return Err(err);
                }

                trace!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed temporarily, retrying"
                );

                sleep(delay).await;

                let next = delay.mul_f64(policy.multiplier);
                delay = next.min(policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_immediately_without_sleeping() {
        let policy = RetryPolicy::default();
        let result: Result<u32, anyhow::Error> =
            wait(&policy, || async { WaitStatus::Finished(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_permanent_failure() {
        let policy = RetryPolicy::default().with_initial_delay(Duration::from_millis(1));
        let attempts = Cell::new(0);
        let result: Result<u32, anyhow::Error> = wait(&policy, || {
            attempts.set(attempts.get() + 1);
            async move {
                if attempts.get() < 3 {
                    WaitStatus::FailedTemporarily(anyhow::anyhow!("not yet"))
                } else {
                    WaitStatus::FailedPermanently(anyhow::anyhow!("gave up"))
                }
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_permanently_on_first_try() {
        let policy = RetryPolicy::default();
        let result: Result<u32, anyhow::Error> =
            wait(&policy, || async { WaitStatus::FailedPermanently(anyhow::anyhow!("nope")) })
                .await;
        assert!(result.is_err());
    }
}
