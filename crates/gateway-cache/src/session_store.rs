//! Redis-backed two-tier [`SessionStore`].
//!
//! # Key format
//!
//! ```text
//! session:v1:{session_id}
//! ```
//!
//! L1 caches only the hot-path [`CachedAccessToken`] projection, never the
//! full record, so a refresh only needs to evict a tiny entry.

use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Pool};
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument, warn};

use gateway_types::error::{GatewayError, Result as GatewayResult};
use gateway_types::ports::SessionStore;
use gateway_types::session::{CachedAccessToken, Session};
use gateway_types::token::decode_access_token_claims;

use crate::l1::BoundedTtlCache;

const KEY_PREFIX: &str = "session:v1:";
const LAST_ACCESS_BUMP_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for [`RedisSessionStore`].
#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    /// Session record TTL in the shared store (default: 24h of inactivity).
    pub session_ttl: Duration,
    /// L1 access-token cache TTL (must stay below the access token lifetime).
    pub l1_ttl: Duration,
    /// L1 cap on number of entries.
    pub l1_max_entries: usize,
    /// TTL on the `online:{user_id}` presence marker the CCU sampler scans for.
    pub online_ttl: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(24 * 3600),
            l1_ttl: Duration::from_secs(60),
            l1_max_entries: 100_000,
            online_ttl: Duration::from_secs(300),
        }
    }
}

/// Two-tier session store: L1 access-token cache plus a Redis-backed L2.
pub struct RedisSessionStore {
    pool: Arc<Pool>,
    l1: BoundedTtlCache<CachedAccessToken>,
    config: SessionStoreConfig,
}

impl RedisSessionStore {
    pub fn new(pool: Arc<Pool>, config: SessionStoreConfig) -> Self {
        let l1 = BoundedTtlCache::new(config.l1_ttl, config.l1_max_entries);
        Self { pool, l1, config }
    }

    fn build_key(session_id: &str) -> String {
        format!("{KEY_PREFIX}{session_id}")
    }

    fn online_key(user_id: &str) -> String {
        gateway_types::metrics::online_key(user_id)
    }

    fn new_session_id() -> String {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    async fn load_from_store(&self, session_id: &str) -> GatewayResult<Option<Session>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let data: Option<String> = conn
            .get(Self::build_key(session_id))
            .await
            .map_err(|e| GatewayError::Store(format!("get session: {e}")))?;

        let Some(json) = data else {
            return Ok(None);
        };

        let session: Session = serde_json::from_str(&json)?;

        if session.refresh_token_expired() {
            debug!(session_id, "refresh token expired, tearing down session");
            self.delete(session_id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn persist(&self, session: &Session) -> GatewayResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let json = serde_json::to_string(session)?;
        let _: () = conn
            .set_ex(Self::build_key(&session.id), json, self.config.session_ttl.as_secs())
            .await
            .map_err(|e| GatewayError::Store(format!("save session: {e}")))?;
        Ok(())
    }

    async fn bump_online_marker(&self, user_id: &str) -> GatewayResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;
        let _: () = conn
            .set_ex(Self::online_key(user_id), "1", self.config.online_ttl.as_secs())
            .await
            .map_err(|e| GatewayError::Store(format!("set online marker: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip(self, access, refresh))]
    async fn create(&self, access: &str, refresh: &str) -> GatewayResult<String> {
        let claims = decode_access_token_claims(access)
            .map_err(|e| GatewayError::CreateFailed(format!("decode access token: {e}")))?;

        let now = SystemTime::now();
        let session = Session {
            id: Self::new_session_id(),
            user_id: claims.sub.clone(),
            username: claims.username(),
            email: claims.email(),
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            access_expires_at: claims.expires_at(),
            refresh_expires_at: now + self.config.session_ttl,
            created_at: now,
            last_accessed_at: now,
        };

        self.persist(&session).await?;
        self.bump_online_marker(&claims.sub).await?;

        info!(session_id = %session.id, user_id = %session.user_id, "session created");
        Ok(session.id)
    }

    #[instrument(skip(self))]
    async fn get(&self, session_id: &str) -> GatewayResult<Option<Session>> {
        let Some(mut session) = self.load_from_store(session_id).await? else {
            return Ok(None);
        };

        self.l1.insert(session_id, CachedAccessToken::from(&session));

        if session.needs_access_bump(LAST_ACCESS_BUMP_INTERVAL) {
            session.last_accessed_at = SystemTime::now();
            self.persist(&session).await?;
        }

        Ok(Some(session))
    }

    #[instrument(skip(self))]
    async fn get_access_token(&self, session_id: &str) -> GatewayResult<Option<CachedAccessToken>> {
        if let Some(cached) = self.l1.get(session_id) {
            return Ok(Some(cached));
        }

        let Some(session) = self.load_from_store(session_id).await? else {
            return Ok(None);
        };

        let cached = CachedAccessToken::from(&session);
        self.l1.insert(session_id, cached.clone());
        Ok(Some(cached))
    }

    #[instrument(skip(self, new_access, new_refresh))]
    async fn update_tokens(
        &self,
        session_id: &str,
        new_access: &str,
        new_refresh: Option<&str>,
    ) -> GatewayResult<()> {
        let Some(mut session) = self.load_from_store(session_id).await? else {
            return Err(GatewayError::Unauthenticated(format!(
                "no session to refresh: {session_id}"
            )));
        };

        let claims = decode_access_token_claims(new_access)
            .map_err(|e| GatewayError::IdPRefreshFailed(format!("decode refreshed token: {e}")))?;

        session.access_token = new_access.to_string();
        session.access_expires_at = claims.expires_at();
        if let Some(refresh) = new_refresh {
            session.refresh_token = refresh.to_string();
        }

        self.persist(&session).await?;
        self.l1.invalidate(session_id);

        debug!(session_id, "tokens refreshed, L1 invalidated");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch_online(&self, user_id: &str) -> GatewayResult<()> {
        self.bump_online_marker(user_id).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, session_id: &str) -> GatewayResult<bool> {
        self.l1.invalidate(session_id);

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let data: Option<String> = conn
            .get(Self::build_key(session_id))
            .await
            .map_err(|e| GatewayError::Store(format!("get session: {e}")))?;

        let existed = match &data {
            Some(json) => {
                if let Ok(session) = serde_json::from_str::<Session>(json) {
                    let _: i64 = conn
                        .del(Self::online_key(&session.user_id))
                        .await
                        .unwrap_or_else(|e| {
                            warn!("failed to clear online marker: {e}");
                            0
                        });
                }
                true
            }
            None => false,
        };

        let _: () = conn
            .del(Self::build_key(session_id))
            .await
            .map_err(|e| GatewayError::Store(format!("delete session: {e}")))?;

        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format_matches_documented_schema() {
        assert_eq!(RedisSessionStore::build_key("abc"), "session:v1:abc");
    }

    #[test]
    fn session_ids_are_random_and_unique() {
        let a = RedisSessionStore::new_session_id();
        let b = RedisSessionStore::new_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
