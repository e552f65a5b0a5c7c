//! Bounded retry with exponential backoff for engine calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Backoff configuration for engine retries.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum retry attempts (not counting the initial attempt).
    pub max_retries: u32,
    /// Base delay, doubled each attempt.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffConfig {
    /// Delay for a given attempt number (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        delay.min(self.max_delay)
    }
}

/// Execute an engine call with bounded backoff.
///
/// Only `is_retryable()` errors are retried; rejections and planning
/// failures propagate immediately so the caller's fallback logic runs.
pub async fn with_backoff<T, F, Fut>(
    config: &BackoffConfig,
    operation: &str,
    op: F,
) -> EngineResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = %operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Engine call failed, retrying: {}",
                    e
                );
                metrics::counter!("engine_retries_total", "operation" => operation.to_string())
                    .increment(1);
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = BackoffConfig {
            max_retries: 5,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(16));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(30));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let config = BackoffConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let calls = AtomicU32::new(0);

        let result = with_backoff(&config, "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(EngineError::transient("flaky"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_bypasses_retry() {
        let config = BackoffConfig::default();
        let calls = AtomicU32::new(0);

        let result: EngineResult<()> = with_backoff(&config, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::rejected("unsafe"))
        })
        .await;

        assert!(matches!(result, Err(EngineError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let config = BackoffConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let result: EngineResult<()> = with_backoff(&config, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::transient("down"))
        })
        .await;

        assert!(matches!(result, Err(EngineError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
