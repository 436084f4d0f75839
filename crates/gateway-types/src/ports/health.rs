//! Health check port.
//!
//! Used by `gateway-api`'s `/healthz` handler and by `MetricsReporter` when
//! it writes a service's own `dashboard:service:{name}:health` snapshot.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result as GatewayResult;

/// Health status of a single component.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { error: String },
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// A single named health check, e.g. "redis", "identity-service".
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> GatewayResult<HealthStatus>;
    fn name(&self) -> &str;
}

/// Aggregates multiple health checks into one overall status.
#[async_trait]
pub trait HealthRegistry: Send + Sync {
    async fn check_all(&self) -> HashMap<String, HealthStatus>;

    async fn overall_status(&self) -> HealthStatus {
        let checks = self.check_all().await;
        if checks.is_empty() {
            return HealthStatus::Unhealthy {
                error: "no health checks registered".to_string(),
            };
        }

        let unhealthy: Vec<&str> = checks
            .iter()
            .filter(|(_, s)| matches!(s, HealthStatus::Unhealthy { .. }))
            .map(|(name, _)| name.as_str())
            .collect();
        if !unhealthy.is_empty() {
            return HealthStatus::Unhealthy {
                error: format!("unhealthy: {}", unhealthy.join(", ")),
            };
        }

        let degraded: Vec<&str> = checks
            .iter()
            .filter(|(_, s)| matches!(s, HealthStatus::Degraded { .. }))
            .map(|(name, _)| name.as_str())
            .collect();
        if !degraded.is_empty() {
            return HealthStatus::Degraded {
                reason: format!("degraded: {}", degraded.join(", ")),
            };
        }

        HealthStatus::Healthy
    }
}
