//! Generic two-tier cache backing both `RoleCache` and `PermissionCache`.
//!
//! The two caches have identical shape and differ only in their L2 key
//! prefix and where they fall through to on a full miss, so this module
//! parameterizes over an [`AuthzSource`] rather than duplicating the cache.

use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Pool};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use gateway_types::error::{GatewayError, Result as GatewayResult};
use gateway_types::ports::AuthzSetCache;

use crate::l1::BoundedTtlCache;

const L1_MAX_ENTRIES: usize = 100_000;

/// Resolves the authoritative set for a user when both cache tiers miss.
///
/// Implemented by a thin wrapper over `RouteDispatcher` hitting
/// IdentityService's `/internal/roles/keycloak/{userId}` or
/// `/internal/permissions/user/{userId}`, wired up in the gateway binary.
#[async_trait]
pub trait AuthzSource: Send + Sync {
    async fn fetch(&self, user_id: &str) -> GatewayResult<HashSet<String>>;
}

/// Two-tier, invalidation-aware cache of role or permission strings.
pub struct RedisAuthzCache {
    pool: Arc<Pool>,
    source: Arc<dyn AuthzSource>,
    l1: BoundedTtlCache<HashSet<String>>,
    l2_key_prefix: String,
    l2_ttl: Duration,
}

impl RedisAuthzCache {
    /// `l2_key_prefix` should be `"authz:roles:"` or `"authz:perms:"`.
    /// `l1_ttl`/`l2_ttl` come from `gateway-config`'s `authz.l1.ttl` /
    /// `authz.l2.ttl` (defaults 60s / 1h per spec.md §3).
    pub fn new(
        pool: Arc<Pool>,
        source: Arc<dyn AuthzSource>,
        l2_key_prefix: impl Into<String>,
        l1_ttl: Duration,
        l2_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            source,
            l1: BoundedTtlCache::new(l1_ttl, L1_MAX_ENTRIES),
            l2_key_prefix: l2_key_prefix.into(),
            l2_ttl,
        }
    }

    fn l2_key(&self, user_id: &str) -> String {
        format!("{}{}", self.l2_key_prefix, user_id)
    }

    async fn get_l2(&self, user_id: &str) -> GatewayResult<Option<HashSet<String>>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let members: Vec<String> = conn
            .smembers(self.l2_key(user_id))
            .await
            .map_err(|e| GatewayError::Store(format!("smembers: {e}")))?;

        if members.is_empty() {
            Ok(None)
        } else {
            Ok(Some(members.into_iter().collect()))
        }
    }

    async fn set_l2(&self, user_id: &str, values: &HashSet<String>) -> GatewayResult<()> {
        if values.is_empty() {
            // Never cache an empty result at L2: a transient identity-service
            // outage must not poison the cache.
            return Ok(());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let key = self.l2_key(user_id);
        let members: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
        let _: () = conn
            .sadd(&key, &members)
            .await
            .map_err(|e| GatewayError::Store(format!("sadd: {e}")))?;
        let _: () = conn
            .expire(&key, self.l2_ttl.as_secs() as i64)
            .await
            .map_err(|e| GatewayError::Store(format!("expire: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl AuthzSetCache for RedisAuthzCache {
    async fn get(&self, user_id: &str) -> GatewayResult<HashSet<String>> {
        if let Some(cached) = self.l1.get(user_id) {
            return Ok(cached);
        }

        if let Some(values) = self.get_l2(user_id).await? {
            self.l1.insert(user_id, values.clone());
            return Ok(values);
        }

        match self.source.fetch(user_id).await {
            Ok(values) => {
                if !values.is_empty() {
                    self.l1.insert(user_id, values.clone());
                    self.set_l2(user_id, &values).await?;
                }
                Ok(values)
            }
            Err(e) => {
                warn!(user_id, error = %e, "authz source fetch failed, returning empty set");
                Ok(HashSet::new())
            }
        }
    }

    async fn invalidate(&self, user_id: &str) -> GatewayResult<()> {
        self.l1.invalidate(user_id);

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;
        let _: () = conn
            .del(self.l2_key(user_id))
            .await
            .map_err(|e| GatewayError::Store(format!("del: {e}")))?;

        debug!(user_id, prefix = %self.l2_key_prefix, "authz cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSource(HashSet<String>);

    #[async_trait]
    impl AuthzSource for StubSource {
        async fn fetch(&self, _user_id: &str) -> GatewayResult<HashSet<String>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn l2_key_uses_configured_prefix() {
        // Exercised indirectly through get()/invalidate() in integration
        // tests that spin up a real pool; this just locks the key shape.
        let prefix = "authz:roles:";
        assert_eq!(format!("{prefix}{}", "user-1"), "authz:roles:user-1");
    }

    #[tokio::test]
    async fn stub_source_returns_configured_roles() {
        let mut roles = HashSet::new();
        roles.insert("ADMIN".to_string());
        let source = StubSource(roles.clone());
        assert_eq!(source.fetch("user-1").await.unwrap(), roles);
    }
}
