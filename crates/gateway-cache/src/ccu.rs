//! Cluster-wide concurrent-user (CCU) sampler.
//!
//! At most one gateway instance performs the `SCAN` over `online:*` keys on
//! any given sampling tick; the others observe lock contention and skip the
//! cycle without error. Mirrors the leader-election lease pattern used
//! elsewhere in this codebase, scoped down to a single compare-and-delete
//! unlock rather than full leadership.

use deadpool_redis::Pool;
use redis::Script;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use gateway_types::error::{GatewayError, Result as GatewayResult};
use gateway_types::metrics::ccu_sampler_lock_key;

const ACQUIRE_SCRIPT: &str = r#"
local key = KEYS[1]
local node_id = ARGV[1]
local ttl_ms = ARGV[2]
local current = redis.call("GET", key)
if current then
    return 0
end
redis.call("SET", key, node_id, "PX", ttl_ms)
return 1
"#;

const RELEASE_SCRIPT: &str = r#"
local key = KEYS[1]
local node_id = ARGV[1]
local current = redis.call("GET", key)
if current == node_id then
    return redis.call("DEL", key)
end
return 0
"#;

/// Samples the cluster-wide concurrent-user count, serialized across
/// instances by a short Redis lease.
pub struct CcuSampler {
    pool: Arc<Pool>,
    node_id: String,
    lease: Duration,
}

impl CcuSampler {
    pub fn new(pool: Arc<Pool>, node_id: impl Into<String>, lease: Duration) -> Self {
        Self {
            pool,
            node_id: node_id.into(),
            lease,
        }
    }

    /// Attempt one sampling cycle. Returns `Ok(Some(count))` if this
    /// instance held the lease and sampled, `Ok(None)` if another instance
    /// currently holds it.
    pub async fn try_sample(&self) -> GatewayResult<Option<usize>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let acquired: i32 = Script::new(ACQUIRE_SCRIPT)
            .key(ccu_sampler_lock_key())
            .arg(&self.node_id)
            .arg(self.lease.as_millis() as u64)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| GatewayError::Store(format!("acquire ccu lease: {e}")))?;

        if acquired != 1 {
            debug!("ccu sampler lease held elsewhere, skipping cycle");
            return Ok(None);
        }

        let count = self.scan_online_count(&mut conn).await;

        let released: i32 = Script::new(RELEASE_SCRIPT)
            .key(ccu_sampler_lock_key())
            .arg(&self.node_id)
            .invoke_async(&mut *conn)
            .await
            .unwrap_or_else(|e| {
                warn!("failed to release ccu lease: {e}");
                0
            });
        if released == 0 {
            warn!("ccu lease was not held by us at release time (lost it to expiry?)");
        }

        let count = count?;
        info!(count, "ccu sample taken");
        Ok(Some(count))
    }

    async fn scan_online_count(
        &self,
        conn: &mut deadpool_redis::Connection,
    ) -> GatewayResult<usize> {
        let mut cursor: u64 = 0;
        let mut total = 0usize;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg("online:*")
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut **conn)
                .await
                .map_err(|e| GatewayError::Store(format!("scan online keys: {e}")))?;

            total += keys.len();
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(total)
    }
}
