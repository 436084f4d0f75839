//! Backend-agnostic shared-store interface.
//!
//! This trait enables dependency inversion for the L2 tier of the
//! gateway's caches, allowing:
//! - Testing with in-memory implementations
//! - Swapping Redis for another shared store
//! - Keeping Redis dependencies scoped to the adapter crates
//!
//! # Example
//!
//! ```rust,ignore
//! use gateway_types::ports::CacheBackend;
//! use std::time::Duration;
//!
//! async fn example(cache: &dyn CacheBackend) -> anyhow::Result<()> {
//!     cache.set("key", b"value", Some(Duration::from_secs(3600))).await?;
//!     if let Some(data) = cache.get("key").await? {
//!         println!("cached: {:?}", data);
//!     }
//!     Ok(())
//! }
//! ```

use crate::error::Result as GatewayResult;
use async_trait::async_trait;
use std::time::Duration;

/// Backend-agnostic cache storage interface.
///
/// Implementations must be thread-safe (`Send + Sync`). All byte slices
/// are treated as opaque binary data; callers own (de)serialization.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Retrieve a value by key. `Ok(None)` on miss or expiry.
    async fn get(&self, key: &str) -> GatewayResult<Option<Vec<u8>>>;

    /// Store a value with an optional TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> GatewayResult<()>;

    /// Delete a key. No error if it did not exist.
    async fn delete(&self, key: &str) -> GatewayResult<()>;

    /// Check existence without fetching the value.
    async fn exists(&self, key: &str) -> GatewayResult<bool>;

    /// Retrieve multiple values in as few round-trips as the backend allows.
    ///
    /// Default implementation issues sequential `get`s; Redis-backed
    /// adapters override this with a pipelined `MGET`.
    async fn mget(&self, keys: &[&str]) -> GatewayResult<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Increment a numeric value atomically, returning the new value.
    async fn incr(&self, key: &str, delta: i64) -> GatewayResult<i64> {
        let current = if let Some(data) = self.get(key).await? {
            String::from_utf8(data)
                .map_err(|e| crate::error::GatewayError::Cache(format!("invalid utf-8: {e}")))?
                .parse::<i64>()
                .map_err(|e| crate::error::GatewayError::Cache(format!("not a number: {e}")))?
        } else {
            0
        };
        let new_value = current + delta;
        self.set(key, new_value.to_string().as_bytes(), None).await?;
        Ok(new_value)
    }

    /// Set a fresh TTL on an existing key without altering its value.
    async fn expire(&self, key: &str, ttl: Duration) -> GatewayResult<bool> {
        if let Some(value) = self.get(key).await? {
            self.set(key, &value, Some(ttl)).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Enumerate keys matching a prefix or glob pattern, in scan batches.
    ///
    /// Backends without native scan support should return `NotSupported`.
    async fn scan_keys(&self, _pattern: &str) -> GatewayResult<Vec<String>> {
        Err(crate::error::GatewayError::Cache(
            "key scanning not supported by this backend".to_string(),
        ))
    }

    /// Health check, defaulting to a throwaway set/delete round-trip.
    async fn health_check(&self) -> GatewayResult<bool> {
        const HEALTH_KEY: &str = "__health_check__";
        self.set(HEALTH_KEY, b"ok", Some(Duration::from_secs(1))).await?;
        self.delete(HEALTH_KEY).await?;
        Ok(true)
    }
}
