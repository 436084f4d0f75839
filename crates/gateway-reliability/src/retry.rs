//! Bounded exponential backoff retry, applied only to idempotent calls.
//!
//! The caller decides idempotency (GET/HEAD/PUT/DELETE, or a retryable
//! status code already seen once) by supplying `is_retryable`; this module
//! only owns the backoff schedule and attempt bookkeeping.

use std::time::Duration;

use rand::Rng;

use gateway_types::error::Result as GatewayResult;

/// Backoff schedule for a single logical operation's retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = config.base_delay.as_millis().saturating_mul(1u128 << attempt.min(16));
    let capped = exp.min(config.max_delay.as_millis());
    let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
    Duration::from_millis(jittered as u64)
}

/// Run `operation` with bounded exponential backoff, retrying only while
/// `is_retryable` returns true for the error and attempts remain.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    is_retryable: impl Fn(&gateway_types::error::GatewayError) -> bool,
    mut operation: F,
) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = GatewayResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < config.max_attempts && is_retryable(&e) => {
                let delay = backoff_delay(config, attempt);
                tracing::debug!(attempt, ?delay, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_types::error::GatewayError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let result = retry_with_backoff(
            &config,
            |e| e.is_retryable(),
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(GatewayError::Downstream("blip".into()))
                    } else {
                        Ok::<_, GatewayError>("ok")
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig::default();

        let result: GatewayResult<()> = retry_with_backoff(&config, |e| e.is_retryable(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Unauthenticated("no session".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let attempts = AtomicU32::new(0);
        let config = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };

        let result: GatewayResult<()> = retry_with_backoff(&config, |e| e.is_retryable(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(GatewayError::Store("still down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
