//! Session store port.
//!
//! Backend-agnostic two-tier session access, so `gateway-api`'s
//! `AuthFilter` depends only on this trait and not on the concrete
//! L1/L2 implementation in `gateway-cache`.

use async_trait::async_trait;

use crate::error::Result as GatewayResult;
use crate::session::{CachedAccessToken, Session};

/// Authoritative access to session records, hiding the L1/L2 split.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Decode `access`/`refresh`, mint a fresh session id, and persist the
    /// record. Fails with `CreateFailed` if decoding or the store write fails.
    async fn create(&self, access: &str, refresh: &str) -> GatewayResult<String>;

    /// Full record lookup. `None` means absent or torn down because the
    /// refresh token itself had expired.
    async fn get(&self, session_id: &str) -> GatewayResult<Option<Session>>;

    /// Hot-path lookup returning only the cached access token.
    async fn get_access_token(&self, session_id: &str) -> GatewayResult<Option<CachedAccessToken>>;

    /// Atomically rewrite the access (and optionally refresh) token,
    /// invalidating the L1 entry so other instances converge within its TTL.
    async fn update_tokens(
        &self,
        session_id: &str,
        new_access: &str,
        new_refresh: Option<&str>,
    ) -> GatewayResult<()>;

    /// Remove a session from both tiers and clear its online marker.
    /// Returns whether the record existed.
    async fn delete(&self, session_id: &str) -> GatewayResult<bool>;

    /// Refresh the `online:{userId}` CCU presence marker's TTL. Called on
    /// every forwarded request, not just at creation, so a long-lived
    /// session keeps counting towards CCU. Default no-op so test doubles
    /// don't need to implement it.
    async fn touch_online(&self, _user_id: &str) -> GatewayResult<()> {
        Ok(())
    }
}
