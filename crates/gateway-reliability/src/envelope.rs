//! Composes the resilience envelope around a downstream call, outer to
//! inner: bulkhead, circuit breaker, rate limiter, retry.
//!
//! Bulkhead sits outermost because an excluded caller shouldn't even count
//! towards the circuit breaker's failure window. Retry sits innermost so
//! only the actual call is repeated, not the surrounding admission checks.

use std::sync::Arc;

use gateway_types::error::Result as GatewayResult;
use gateway_types::ports::circuit_breaker::CircuitBreaker as CircuitBreakerPort;
use gateway_types::ports::rate_limit::RateLimiter as RateLimiterPort;

use crate::bulkhead::Bulkhead;
use crate::retry::{retry_with_backoff, RetryConfig};

/// One service's full resilience stack.
pub struct ResilienceEnvelope {
    pub service_name: String,
    pub bulkhead: Bulkhead,
    pub circuit_breaker: Arc<dyn CircuitBreakerPort>,
    pub rate_limiter: Arc<dyn RateLimiterPort>,
    pub retry: RetryConfig,
}

impl ResilienceEnvelope {
    pub fn new(
        service_name: impl Into<String>,
        max_concurrent: usize,
        circuit_breaker: Arc<dyn CircuitBreakerPort>,
        rate_limiter: Arc<dyn RateLimiterPort>,
        retry: RetryConfig,
    ) -> Self {
        let service_name = service_name.into();
        Self {
            bulkhead: Bulkhead::new(service_name.clone(), max_concurrent),
            service_name,
            circuit_breaker,
            rate_limiter,
            retry,
        }
    }

    /// Run `call` through the full envelope. `call` is re-invoked on each
    /// retry attempt, so it must be idempotent whenever `is_retryable` can
    /// return true for its errors.
    pub async fn run<F, Fut, T>(&self, is_retryable: impl Fn(&gateway_types::error::GatewayError) -> bool, mut call: F) -> GatewayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = GatewayResult<T>>,
    {
        let _permit = self.bulkhead.try_acquire()?;

        self.circuit_breaker.try_call().await?;

        self.rate_limiter.acquire(&self.service_name).await?;

        let outcome = retry_with_backoff(&self.retry, is_retryable, &mut call).await;

        match &outcome {
            Ok(_) => self.circuit_breaker.on_success().await,
            Err(_) => self.circuit_breaker.on_failure().await,
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::AtomicCircuitBreaker;
    use crate::rate_limiter::KeyedRateLimiter;
    use gateway_types::error::GatewayError;
    use gateway_types::ports::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn envelope() -> ResilienceEnvelope {
        ResilienceEnvelope::new(
            "downstream-a",
            4,
            Arc::new(AtomicCircuitBreaker::with_real_clock(
                "downstream-a",
                CircuitBreakerConfig::default(),
            )),
            Arc::new(KeyedRateLimiter::new(100, 100)),
            RetryConfig {
                max_attempts: 2,
                base_delay: std::time::Duration::from_millis(1),
                max_delay: std::time::Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn succeeds_on_first_try() {
        let env = envelope();
        let result = env
            .run(|e| e.is_retryable(), || async { Ok::<_, GatewayError>(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_a_transient_downstream_error() {
        let env = envelope();
        let attempts = AtomicU32::new(0);
        let result = env
            .run(
                |e| e.is_retryable(),
                || {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(GatewayError::Downstream("blip".into()))
                        } else {
                            Ok(1)
                        }
                    }
                },
            )
            .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn propagates_non_retryable_error_without_tripping_extra_attempts() {
        let env = envelope();
        let attempts = AtomicU32::new(0);
        let result: GatewayResult<()> = env
            .run(
                |e| e.is_retryable(),
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(GatewayError::Unauthenticated("no session".into())) }
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
