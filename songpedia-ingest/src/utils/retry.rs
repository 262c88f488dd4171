//! Bounded exponential-backoff retry
//!
//! Used for transient remote failures of the catalog service.
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is transient and retries remain: log WARN, back off, retry
//! 4. Otherwise return the error
//!
//! **Backoff Strategy:**
//! - Initial delay: `initial_backoff`
//! - Multiplier: 2.0, capped at `max_backoff`
//! - An error may demand a longer wait (e.g. `Retry-After`), which wins

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Retry `operation` while `classify` reports the error as transient.
///
/// `classify` returns `None` for permanent errors, or `Some(min_wait)` for
/// transient ones where `min_wait` is a server-requested delay (zero if none).
pub async fn retry_with_backoff<T, E, F, Fut, C>(
    operation_name: &str,
    policy: RetryPolicy,
    classify: C,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> Option<Duration>,
    E: Display,
{
    let mut retry = 0u32;

    loop {
        match operation().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        retries = retry,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let Some(requested) = classify(&err) else {
                    return Err(err);
                };

                if retry >= policy.max_retries {
                    tracing::error!(
                        operation = operation_name,
                        retries = retry,
                        error = %err,
                        "Operation failed: retry budget exhausted"
                    );
                    return Err(err);
                }

                retry += 1;
                let wait = policy.backoff_for(retry).max(requested);
                tracing::warn!(
                    operation = operation_name,
                    retry,
                    max_retries = policy.max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after backoff"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn transient(err: &String) -> Option<Duration> {
        if err.starts_with("transient") {
            Some(Duration::ZERO)
        } else {
            None
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let result = retry_with_backoff("test_op", fast_policy(3), transient, || async {
            Ok::<i32, String>(42)
        })
        .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff("test_op", fast_policy(3), transient, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient: 503".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_with_backoff("test_op", fast_policy(2), transient, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("transient: timeout".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_with_backoff("test_op", fast_policy(5), transient, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal: 400".to_string()) }
            })
            .await;

        assert_eq!(result, Err("fatal: 400".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(9), Duration::from_millis(350));
    }
}
