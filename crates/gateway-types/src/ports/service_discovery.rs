//! Service discovery port used by `RouteDispatcher` to resolve a logical
//! service name to a set of candidate endpoints before applying load
//! balancing and the reliability envelope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result as GatewayResult;

/// A single resolved endpoint for a logical service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL, e.g. `http://business-service:8080`.
    pub base_url: String,
    /// Stable identifier used for circuit-breaker/rate-limiter keying.
    pub id: String,
}

/// Resolves a logical service name to its currently known endpoints.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// Look up endpoints for `service_name`. An empty vec (not an error)
    /// means the name is known but currently has no healthy instances.
    async fn resolve(&self, service_name: &str) -> GatewayResult<Vec<Endpoint>>;
}
