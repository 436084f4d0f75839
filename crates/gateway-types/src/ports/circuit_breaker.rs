//! Circuit breaker port definition.
//!
//! Implements the classic Closed/Open/HalfOpen state machine used by
//! `RouteDispatcher` to fail fast against an unhealthy downstream service
//! rather than pile up latency behind it.

use crate::error::Result as GatewayResult;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow through normally; failures are counted.
    Closed,
    /// Requests are rejected immediately until the recovery timeout elapses.
    Open,
    /// A limited number of trial requests are allowed through to test recovery.
    HalfOpen,
}

/// Thresholds and timeouts governing a circuit breaker's transitions.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait before transitioning from Open to HalfOpen.
    pub recovery_timeout: Duration,
    /// Maximum number of trial requests allowed in HalfOpen.
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
        }
    }
}

/// Point-in-time statistics for monitoring and dashboards.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub circuit_opens: u64,
    pub current_failures: u32,
}

impl Default for CircuitBreakerStats {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            circuit_opens: 0,
            current_failures: 0,
        }
    }
}

/// Backend-agnostic circuit breaker interface.
///
/// Implementations must be thread-safe (`Send + Sync`) and must never hold
/// an internal lock across an `.await` point — state transitions are
/// computed under a brief lock, then acted on.
#[async_trait]
pub trait CircuitBreaker: Send + Sync + Debug {
    /// Current state.
    async fn state(&self) -> CircuitState;

    /// Attempt to acquire permission to execute a call.
    ///
    /// `Err(CircuitOpen)` when the circuit is open or HalfOpen trial slots
    /// are exhausted.
    async fn try_call(&self) -> GatewayResult<()>;

    /// Record a successful call outcome.
    async fn on_success(&self);

    /// Record a failed call outcome.
    async fn on_failure(&self);

    /// Current statistics.
    async fn stats(&self) -> GatewayResult<CircuitBreakerStats>;

    /// Force the circuit back to Closed, clearing counters.
    async fn reset(&self) -> GatewayResult<()>;

    /// Convenience: whether a call would currently be permitted.
    async fn is_call_permitted(&self) -> bool {
        self.try_call().await.is_ok()
    }
}

/// Run `operation` through a circuit breaker, recording the outcome.
pub async fn with_circuit_breaker<F, Fut, T>(
    circuit: &dyn CircuitBreaker,
    operation: F,
) -> GatewayResult<T>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = GatewayResult<T>>,
{
    circuit.try_call().await?;
    match operation().await {
        Ok(result) => {
            circuit.on_success().await;
            Ok(result)
        }
        Err(e) => {
            circuit.on_failure().await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.half_open_max_requests, 3);
    }

    #[test]
    fn default_stats_start_closed() {
        let stats = CircuitBreakerStats::default();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.total_requests, 0);
    }
}
