//! Shared deadpool-redis pool construction, used by every adapter in this
//! crate so connection settings stay in one place.

use deadpool_redis::{Config, Pool, Runtime};
use gateway_types::error::{GatewayError, Result as GatewayResult};

/// Build a pooled Redis client from a connection URL.
pub fn build_pool(redis_url: &str) -> GatewayResult<Pool> {
    let cfg = Config::from_url(redis_url);
    cfg.create_pool(Some(Runtime::Tokio1))
        .map_err(|e| GatewayError::Store(format!("failed to create Redis pool: {e}")))
}
