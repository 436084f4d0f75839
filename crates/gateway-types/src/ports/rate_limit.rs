//! Rate limiting port.
//!
//! Backend-agnostic trait for request rate limiting, used by
//! `gateway-reliability`'s per-endpoint/per-client envelope.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::GatewayError;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Rate limiting port trait.
///
/// Concrete adapters (token bucket in-memory, Redis-backed sliding window)
/// implement this trait.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check whether a request for `key` would currently be allowed,
    /// without consuming quota.
    async fn check(&self, key: &str) -> Result<()>;

    /// Consume one unit of quota for `key`.
    ///
    /// `Err(RateLimitExceeded)` when quota would be exceeded.
    async fn acquire(&self, key: &str) -> Result<()>;

    /// Reset quota for `key`, used administratively and in tests.
    async fn reset(&self, key: &str) -> Result<()>;

    /// Remaining quota units for `key`.
    async fn remaining(&self, key: &str) -> Result<usize>;
}

/// Point-in-time statistics for a rate-limited key.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RateLimitStats {
    pub key: String,
    pub available_tokens: f64,
    pub last_request_age: Duration,
}
