use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_retry::RetryIf;
use tracing::warn;

use crate::llm::{ErrorKind, LlmError};

/// Capped exponential backoff for completion calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(600),
            factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No sleeping between attempts; used by tests and the CLI demo.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            factor: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Sleep durations between consecutive attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let base = self.base_delay;
        let factor = self.factor.max(1);
        let cap = self.max_delay;
        (0..self.max_attempts.saturating_sub(1)).map(move |retry| {
            let multiplier = factor.saturating_pow(retry);
            base.saturating_mul(multiplier).min(cap)
        })
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the attempt
/// budget is spent. Delays suspend only the calling task.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    unit: &str,
    mut operation: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let attempt = AtomicU32::new(0);
    let max_attempts = policy.max_attempts.max(1);

    RetryIf::spawn(
        policy.delays(),
        || {
            attempt.fetch_add(1, Ordering::Relaxed);
            operation()
        },
        |err: &LlmError| {
            let made = attempt.load(Ordering::Relaxed);
            let retry = err.kind() != ErrorKind::Permanent && made < max_attempts;
            if retry {
                warn!(
                    unit,
                    attempt = made,
                    max_attempts,
                    kind = ?err.kind(),
                    error = %err,
                    "completion failed, backing off"
                );
            }
            retry
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_multiplicatively_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(600),
            factor: 2,
            max_delay: Duration::from_millis(3000),
        };
        let delays: Vec<u64> = policy.delays().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![600, 1200, 2400, 3000]);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::immediate(3), "test", || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 2 {
                    Err(LlmError::Transient("flaky".to_string()))
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_abort_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = with_retry(&RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Permanent("bad key".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limits_exhaust_the_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = with_retry(&RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::RateLimited("429".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
