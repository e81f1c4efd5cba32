//! Shared retry/backoff utility.
//!
//! One policy type drives every retried network operation in the crate
//! (chunk uploads, finalize calls, stream connection establishment) instead
//! of per-call-site retry loops.

use crate::defaults;
use crate::error::{Result, StreamcapError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry policy: how often to retry and how long to wait between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = max_retries + 1.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            base_delay: defaults::BACKOFF_BASE,
            max_delay: defaults::BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(10);
        let factor = 1u64 << exp;
        self.base_delay
            .saturating_mul(factor as u32)
            .min(self.max_delay)
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Runs `op` until it succeeds, a non-retryable error occurs, or the policy
/// is exhausted. The attempt number (starting at 1) is passed to `op`.
///
/// `is_retryable` decides which errors are worth another attempt; the last
/// error is returned unchanged so callers keep the full failure detail.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&StreamcapError) -> bool,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts() && is_retryable(&err) => {
                let delay = policy.delay_for(attempt);
                debug!(attempt, ?delay, error = %err, "retrying after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_delay_doubles_per_retry() {
        let p = policy(5);
        assert_eq!(p.delay_for(1), Duration::from_millis(10));
        assert_eq!(p.delay_for(2), Duration::from_millis(20));
        assert_eq!(p.delay_for(3), Duration::from_millis(40));
    }

    #[test]
    fn test_delay_is_capped() {
        let p = policy(20);
        assert_eq!(p.delay_for(10), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();
        let result = retry_with_backoff(&policy(3), StreamcapError::is_retryable, |_| {
            let calls = calls_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_attempted_exactly_max_retries_plus_one() {
        let p = policy(3);
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();
        let result: Result<()> = retry_with_backoff(&p, StreamcapError::is_retryable, |_| {
            let calls = calls_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StreamcapError::Transport {
                    message: "always down".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), p.max_retries + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();
        let result: Result<()> = retry_with_backoff(&policy(5), StreamcapError::is_retryable, |_| {
            let calls = calls_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StreamcapError::Auth {
                    message: "rejected".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(StreamcapError::Auth { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();
        let result = retry_with_backoff(&policy(3), StreamcapError::is_retryable, |attempt| {
            let calls = calls_op.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Err(StreamcapError::Timeout {
                        message: "slow".into(),
                    })
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
