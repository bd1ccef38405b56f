//! Bounded retry with a fixed delay between attempts

use crate::reporter::{DeployEvent, Reporter};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

/// Retry configuration applied to every remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay between a failed attempt and the next one
    pub delay: Duration,

    /// Upper bound for a single attempt; a timed-out attempt counts as failed
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            attempt_timeout: None,
        }
    }

    /// A policy that runs the operation exactly once
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_attempt_timeout(mut self, limit: Duration) -> Self {
        self.attempt_timeout = Some(limit);
        self
    }
}

/// Why a single attempt failed
#[derive(Debug)]
pub enum AttemptError<E> {
    Failed(E),
    TimedOut(Duration),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(e) => e.fmt(f),
            AttemptError::TimedOut(limit) => write!(f, "attempt timed out after {:?}", limit),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for AttemptError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Failed(e) => Some(e),
            AttemptError::TimedOut(_) => None,
        }
    }
}

/// Terminal error: every attempt failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Name of the operation that was retried
    pub operation: String,

    /// Number of attempts made
    pub attempts: u32,

    /// Failure of the final attempt
    pub last: AttemptError<E>,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation '{}' failed after {} attempt(s): {}",
            self.operation, self.attempts, self.last
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last)
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// Every failed attempt is reported as [`DeployEvent::AttemptFailed`]. The
/// delay only separates attempts: there is no wait after the last one. No
/// state is kept between calls, so concurrent invocations are independent.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    reporter: &dyn Reporter,
    mut op: F,
) -> std::result::Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match policy.attempt_timeout {
            Some(limit) => match timeout(limit, op()).await {
                Ok(result) => result.map_err(AttemptError::Failed),
                Err(_) => Err(AttemptError::TimedOut(limit)),
            },
            None => op().await.map_err(AttemptError::Failed),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let will_retry = attempt < max_attempts;
                reporter.report(&DeployEvent::AttemptFailed {
                    operation: operation.to_string(),
                    attempt,
                    max_attempts,
                    will_retry,
                    error: err.to_string(),
                });

                if !will_retry {
                    return Err(RetryExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: err,
                    });
                }

                sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryReporter;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stratus_cloud::CloudError;
    use tokio::time::Instant;

    fn flaky(failures: u32, calls: &AtomicU32) -> std::result::Result<u32, CloudError> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(CloudError::Http(format!("attempt {} refused", n)))
        } else {
            Ok(n)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_makes_one_call() {
        let reporter = MemoryReporter::new();
        let calls = &AtomicU32::new(0);
        let started = Instant::now();

        let value = retry(&RetryPolicy::default(), "op", &reporter, || async move {
            flaky(0, calls)
        })
        .await
        .unwrap();

        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert!(reporter.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures_stops_retrying() {
        let reporter = MemoryReporter::new();
        let calls = &AtomicU32::new(0);
        let started = Instant::now();

        let value = retry(&RetryPolicy::default(), "op", &reporter, || async move {
            flaky(2, calls)
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert_eq!(reporter.attempt_failures("op"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_makes_exactly_max_attempts_without_trailing_delay() {
        let reporter = MemoryReporter::new();
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(4, Duration::from_millis(250));
        let started = Instant::now();

        let err = retry(&policy, "create thing", &reporter, || async move {
            flaky(u32::MAX, calls)
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.operation, "create thing");
        assert!(err.to_string().contains("attempt 4 refused"));
        // three gaps between four attempts, none after the last
        assert_eq!(started.elapsed(), Duration::from_millis(750));

        let events = reporter.events();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events.last(),
            Some(DeployEvent::AttemptFailed {
                attempt: 4,
                will_retry: false,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy_never_waits() {
        let reporter = MemoryReporter::new();
        let calls = &AtomicU32::new(0);
        let started = Instant::now();

        let err = retry(&RetryPolicy::no_retry(), "op", &reporter, || async move {
            flaky(u32::MAX, calls)
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_attempt_counts_as_failure() {
        let reporter = MemoryReporter::new();
        let policy = RetryPolicy::new(2, Duration::from_secs(5))
            .with_attempt_timeout(Duration::from_secs(30));
        let started = Instant::now();

        let err = retry(&policy, "hung call", &reporter, || async {
            sleep(Duration::from_secs(3600)).await;
            Ok::<_, CloudError>(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts, 2);
        assert!(matches!(err.last, AttemptError::TimedOut(_)));
        assert_eq!(started.elapsed(), Duration::from_secs(65));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_invocations_do_not_share_state() {
        let reporter = MemoryReporter::new();
        let a_calls = &AtomicU32::new(0);
        let b_calls = &AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let (a, b) = tokio::join!(
            retry(&policy, "a", &reporter, || async move { flaky(1, a_calls) }),
            retry(&policy, "b", &reporter, || async move { flaky(u32::MAX, b_calls) }),
        );

        assert_eq!(a.unwrap(), 2);
        assert_eq!(b.unwrap_err().attempts, 3);
        assert_eq!(reporter.attempt_failures("a"), 1);
        assert_eq!(reporter.attempt_failures("b"), 3);
    }
}
