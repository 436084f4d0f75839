//! # Gateway Reliability
//!
//! The resilience envelope `RouteDispatcher` wraps around every downstream
//! call: bulkhead (outermost) → circuit breaker → rate limiter → retry
//! (innermost, bounded exponential backoff, idempotent calls only).
//!
//! ## Organization
//!
//! - `circuit_breaker`: lock-free atomic [`CircuitBreaker`](gateway_types::ports::circuit_breaker::CircuitBreaker) implementation
//! - `rate_limiter`: per-key token bucket [`RateLimiter`](gateway_types::ports::rate_limit::RateLimiter) implementation
//! - `bulkhead`: per-service concurrency cap
//! - `retry`: bounded exponential backoff with jitter
//! - `envelope`: composes the four into one `ResilienceEnvelope`

pub mod bulkhead;
pub mod circuit_breaker;
pub mod envelope;
pub mod rate_limiter;
pub mod retry;

pub use bulkhead::Bulkhead;
pub use circuit_breaker::{AtomicCircuitBreaker, Clock, RealClock};
pub use envelope::ResilienceEnvelope;
pub use rate_limiter::KeyedRateLimiter;
pub use retry::{retry_with_backoff, RetryConfig};
