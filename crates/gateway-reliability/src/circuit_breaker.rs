//! Lock-free circuit breaker.
//!
//! Three states (Closed/Open/HalfOpen) tracked with atomics and a semaphore
//! for half-open trial permits, so `try_call`/`on_success`/`on_failure` never
//! hold a lock across an `.await`.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering::Relaxed};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use gateway_types::error::{GatewayError, Result as GatewayResult};
use gateway_types::ports::circuit_breaker::{
    CircuitBreaker as CircuitBreakerPort, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
};

/// Time source abstraction so tests can advance the clock deterministically.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> u64;
}

#[derive(Default, Debug)]
pub struct RealClock;

impl Clock for RealClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

fn state_from_u8(v: u8) -> CircuitState {
    match v {
        1 => CircuitState::Open,
        2 => CircuitState::HalfOpen,
        _ => CircuitState::Closed,
    }
}

/// Atomic, semaphore-backed circuit breaker for one logical downstream service.
#[derive(Debug)]
pub struct AtomicCircuitBreaker {
    name: String,
    state: AtomicU8,
    failures: AtomicU32,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    circuit_opens: AtomicU64,
    open_until_ms: AtomicU64,
    half_open_permits: Arc<Semaphore>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl AtomicCircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let permits = config.half_open_max_requests as usize;
        Self {
            name: name.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            failures: AtomicU32::new(0),
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            circuit_opens: AtomicU64::new(0),
            open_until_ms: AtomicU64::new(0),
            half_open_permits: Arc::new(Semaphore::new(permits)),
            config,
            clock,
        }
    }

    pub fn with_real_clock(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::new(name, config, Arc::new(RealClock))
    }

    fn raw_state(&self) -> CircuitState {
        state_from_u8(self.state.load(Relaxed))
    }

    fn trip_open(&self) {
        self.state.store(CircuitState::Open as u8, Relaxed);
        self.failures.store(0, Relaxed);
        let until = self.clock.now_ms() + self.config.recovery_timeout.as_millis() as u64;
        self.open_until_ms.store(until, Relaxed);
        self.circuit_opens.fetch_add(1, Relaxed);
        let max = self.config.half_open_max_requests as usize;
        let avail = self.half_open_permits.available_permits();
        if avail < max {
            self.half_open_permits.add_permits(max - avail);
        }
        tracing::warn!(service = %self.name, "circuit breaker opened");
    }
}

#[async_trait]
impl CircuitBreakerPort for AtomicCircuitBreaker {
    async fn state(&self) -> CircuitState {
        self.raw_state()
    }

    async fn try_call(&self) -> GatewayResult<()> {
        self.total_requests.fetch_add(1, Relaxed);
        match self.raw_state() {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let now = self.clock.now_ms();
                if now >= self.open_until_ms.load(Relaxed) {
                    self.state.store(CircuitState::HalfOpen as u8, Relaxed);
                    tracing::info!(service = %self.name, "circuit breaker half-open");
                    // `async_trait` already boxes this method's future, so the
                    // recursive call here doesn't blow up the state size.
                    self.try_call().await
                } else {
                    Err(GatewayError::CircuitOpen(self.name.clone()))
                }
            }
            CircuitState::HalfOpen => {
                match Arc::clone(&self.half_open_permits).try_acquire_owned() {
                    Ok(permit) => {
                        // Dropped immediately: outcome is reported separately via
                        // on_success/on_failure rather than an RAII guard, since the
                        // port trait doesn't thread a permit token through the call site.
                        drop(permit);
                        Ok(())
                    }
                    Err(_) => Err(GatewayError::CircuitOpen(format!(
                        "{} (half-open saturated)",
                        self.name
                    ))),
                }
            }
        }
    }

    async fn on_success(&self) {
        self.successful_requests.fetch_add(1, Relaxed);
        match self.raw_state() {
            CircuitState::Closed => {
                self.failures.store(0, Relaxed);
            }
            CircuitState::HalfOpen => {
                self.state.store(CircuitState::Closed as u8, Relaxed);
                self.failures.store(0, Relaxed);
                tracing::info!(service = %self.name, "circuit breaker closed after recovery");
            }
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        self.failed_requests.fetch_add(1, Relaxed);
        match self.raw_state() {
            CircuitState::Closed => {
                let f = self.failures.fetch_add(1, Relaxed) + 1;
                if f >= self.config.failure_threshold {
                    self.trip_open();
                }
            }
            CircuitState::HalfOpen => self.trip_open(),
            CircuitState::Open => {}
        }
    }

    async fn stats(&self) -> GatewayResult<CircuitBreakerStats> {
        Ok(CircuitBreakerStats {
            state: self.raw_state(),
            total_requests: self.total_requests.load(Relaxed),
            successful_requests: self.successful_requests.load(Relaxed),
            failed_requests: self.failed_requests.load(Relaxed),
            circuit_opens: self.circuit_opens.load(Relaxed),
            current_failures: self.failures.load(Relaxed),
        })
    }

    async fn reset(&self) -> GatewayResult<()> {
        self.state.store(CircuitState::Closed as u8, Relaxed);
        self.failures.store(0, Relaxed);
        let max = self.config.half_open_max_requests as usize;
        let avail = self.half_open_permits.available_permits();
        if avail < max {
            self.half_open_permits.add_permits(max - avail);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as StdAtomicU64;
    use std::time::Duration;

    #[derive(Default, Debug)]
    struct TestClock {
        now: StdAtomicU64,
    }

    impl TestClock {
        fn advance(&self, ms: u64) {
            self.now.fetch_add(ms, Relaxed);
        }
    }

    impl Clock for TestClock {
        fn now_ms(&self) -> u64 {
            self.now.load(Relaxed)
        }
    }

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(5),
            half_open_max_requests: 2,
        }
    }

    #[tokio::test]
    async fn closed_to_open_to_half_open_to_closed() {
        let clock = Arc::new(TestClock::default());
        let cb = AtomicCircuitBreaker::new("svc", config(), clock.clone());

        assert_eq!(cb.state().await, CircuitState::Closed);
        cb.on_failure().await;
        cb.on_failure().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        cb.on_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        assert!(cb.try_call().await.is_err());

        clock.advance(5_000);
        assert!(cb.try_call().await.is_ok());
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.on_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let clock = Arc::new(TestClock::default());
        let cb = AtomicCircuitBreaker::new("svc", config(), clock.clone());

        cb.on_failure().await;
        cb.on_failure().await;
        cb.on_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        clock.advance(5_000);
        cb.try_call().await.unwrap();
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.on_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn stats_track_totals() {
        let cb = AtomicCircuitBreaker::with_real_clock("svc", config());
        cb.try_call().await.unwrap();
        cb.on_success().await;
        let stats = cb.stats().await.unwrap();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_requests, 1);
    }
}
