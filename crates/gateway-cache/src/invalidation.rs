//! Subscribes to the `authz:invalidate` channel IdentityService publishes on
//! role/permission change, and evicts the matching entry from the local
//! `RoleCache`/`PermissionCache` L1 (and the shared L2).
//!
//! Invalidation is best-effort: if this subscription drops or a message is
//! lost, L1 still converges within its TTL.

use gateway_types::ports::AuthzSetCache;
use redis::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

const INVALIDATE_CHANNEL: &str = "authz:invalidate";

/// Payload published by IdentityService on a role/permission change.
#[derive(Debug, Deserialize)]
struct InvalidationMessage {
    user_id: String,
}

/// Run the pub/sub listener loop until the connection is lost; callers
/// typically `tokio::spawn` this once per gateway instance and let it
/// reconnect externally (the caller's supervisor decides retry policy).
pub async fn run_invalidation_listener(
    redis_url: String,
    role_cache: Arc<dyn AuthzSetCache>,
    permission_cache: Arc<dyn AuthzSetCache>,
) {
    let client = match Client::open(redis_url) {
        Ok(client) => client,
        Err(e) => {
            error!("invalidation listener: failed to build redis client: {e}");
            return;
        }
    };

    let mut pubsub = match client.get_async_pubsub().await {
        Ok(pubsub) => pubsub,
        Err(e) => {
            error!("invalidation listener: failed to open pubsub connection: {e}");
            return;
        }
    };

    if let Err(e) = pubsub.subscribe(INVALIDATE_CHANNEL).await {
        error!("invalidation listener: failed to subscribe: {e}");
        return;
    }

    info!(channel = INVALIDATE_CHANNEL, "authz invalidation listener started");

    let mut stream = pubsub.on_message();
    while let Some(msg) = futures_util::StreamExt::next(&mut stream).await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                warn!("invalidation listener: bad payload: {e}");
                continue;
            }
        };

        let parsed: InvalidationMessage = match serde_json::from_str(&payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("invalidation listener: undecodable message {payload:?}: {e}");
                continue;
            }
        };

        if let Err(e) = role_cache.invalidate(&parsed.user_id).await {
            warn!(user_id = %parsed.user_id, "role cache invalidation failed: {e}");
        }
        if let Err(e) = permission_cache.invalidate(&parsed.user_id).await {
            warn!(user_id = %parsed.user_id, "permission cache invalidation failed: {e}");
        }
    }

    warn!("authz invalidation listener stream ended");
}
