//! Role/permission cache port.
//!
//! `RoleCache` and `PermissionCache` in `gateway-cache` both implement this
//! trait; they differ only in their key prefix and the IdentityService path
//! segment they fall through to.

use async_trait::async_trait;

use crate::error::Result as GatewayResult;
use std::collections::HashSet;

/// Two-tier, invalidation-aware cache of short string identifiers keyed by
/// user id — used for both roles and permissions.
#[async_trait]
pub trait AuthzSetCache: Send + Sync {
    /// Resolve the set for `user_id`, falling through L1 -> L2 -> source.
    /// An all-tiers miss returns the empty set without populating L2, so a
    /// transient identity-service outage can't poison the cache.
    async fn get(&self, user_id: &str) -> GatewayResult<HashSet<String>>;

    /// Drop the cached entry for `user_id` at both tiers.
    async fn invalidate(&self, user_id: &str) -> GatewayResult<()>;
}
