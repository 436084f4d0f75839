//! Service discovery adapters.
//!
//! `StaticServiceDiscovery` is the production adapter: a refreshable table
//! loaded from configuration. `InMemoryServiceDiscovery` is a bare `RwLock`
//! map used in tests to simulate endpoints appearing and disappearing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use gateway_types::error::Result as GatewayResult;
use gateway_types::ports::service_discovery::{Endpoint, ServiceDiscovery};

/// Production adapter backed by a config-loaded, refreshable table of
/// service name to endpoint list.
pub struct StaticServiceDiscovery {
    table: Arc<RwLock<HashMap<String, Vec<Endpoint>>>>,
}

impl StaticServiceDiscovery {
    pub fn new(table: HashMap<String, Vec<Endpoint>>) -> Self {
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Replace the whole table, used by the config hot-reload watcher.
    pub async fn refresh(&self, table: HashMap<String, Vec<Endpoint>>) {
        *self.table.write().await = table;
    }
}

#[async_trait]
impl ServiceDiscovery for StaticServiceDiscovery {
    async fn resolve(&self, service_name: &str) -> GatewayResult<Vec<Endpoint>> {
        Ok(self.table.read().await.get(service_name).cloned().unwrap_or_default())
    }
}

/// Test-only in-memory discovery: endpoints can be added/removed mid-test
/// to exercise `RouteDispatcher`'s zero-endpoint and failover paths.
#[derive(Default)]
pub struct InMemoryServiceDiscovery {
    table: Arc<RwLock<HashMap<String, Vec<Endpoint>>>>,
}

impl InMemoryServiceDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, service_name: &str, endpoints: Vec<Endpoint>) {
        self.table.write().await.insert(service_name.to_string(), endpoints);
    }

    pub async fn clear(&self, service_name: &str) {
        self.table.write().await.remove(service_name);
    }
}

#[async_trait]
impl ServiceDiscovery for InMemoryServiceDiscovery {
    async fn resolve(&self, service_name: &str) -> GatewayResult<Vec<Endpoint>> {
        Ok(self.table.read().await.get(service_name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_discovery_returns_empty_for_unknown_service() {
        let discovery = StaticServiceDiscovery::new(HashMap::new());
        let endpoints = discovery.resolve("unknown").await.unwrap();
        assert!(endpoints.is_empty());
    }

    #[tokio::test]
    async fn in_memory_discovery_reflects_updates() {
        let discovery = InMemoryServiceDiscovery::new();
        discovery
            .set(
                "business-service",
                vec![Endpoint {
                    base_url: "http://business-service-1:8080".into(),
                    id: "business-service-1".into(),
                }],
            )
            .await;

        let endpoints = discovery.resolve("business-service").await.unwrap();
        assert_eq!(endpoints.len(), 1);

        discovery.clear("business-service").await;
        assert!(discovery.resolve("business-service").await.unwrap().is_empty());
    }
}
