//! Correlates `/auth/login`'s PKCE verifier and post-login redirect target
//! with the `state` parameter the IdP echoes back to `/auth/callback`.
//!
//! Backed by Redis (not L1) because the login and callback legs of the
//! redirect may land on different gateway instances behind a load
//! balancer. Single-use: `take` deletes the entry so a replayed callback
//! can't reuse a verifier.

use deadpool_redis::{redis::AsyncCommands, Pool};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use gateway_types::error::{GatewayError, Result as GatewayResult};

const KEY_PREFIX: &str = "oauth:state:";
const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingAuth {
    code_verifier: String,
    redirect_uri: String,
}

/// One outstanding `/auth/login` → `/auth/callback` correlation record.
pub struct OAuthStateStore {
    pool: Arc<Pool>,
}

impl OAuthStateStore {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }

    fn key(state: &str) -> String {
        format!("{KEY_PREFIX}{state}")
    }

    /// Record the verifier and the URI to redirect to once login completes.
    pub async fn put(&self, state: &str, code_verifier: &str, redirect_uri: &str) -> GatewayResult<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let record = PendingAuth {
            code_verifier: code_verifier.to_string(),
            redirect_uri: redirect_uri.to_string(),
        };
        let json = serde_json::to_string(&record)?;

        let _: () = conn
            .set_ex(Self::key(state), json, DEFAULT_TTL.as_secs())
            .await
            .map_err(|e| GatewayError::Store(format!("save oauth state: {e}")))?;
        Ok(())
    }

    /// Consume the record for `state`, returning `(code_verifier, redirect_uri)`.
    /// Returns `None` if `state` is unknown, already consumed, or expired —
    /// the caller should treat this as an invalid-request, not retry.
    pub async fn take(&self, state: &str) -> GatewayResult<Option<(String, String)>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Store(format!("redis pool: {e}")))?;

        let key = Self::key(state);
        let data: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| GatewayError::Store(format!("get oauth state: {e}")))?;

        let Some(json) = data else {
            return Ok(None);
        };

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| GatewayError::Store(format!("delete oauth state: {e}")))?;

        let record: PendingAuth = serde_json::from_str(&json)?;
        Ok(Some((record.code_verifier, record.redirect_uri)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_namespaced() {
        assert_eq!(OAuthStateStore::key("abc"), "oauth:state:abc");
    }
}
