//! Adapts [`RouteDispatcher`] into the [`AuthzSource`] port, so
//! `RedisAuthzCache` falls through to the identity service on an L1+L2
//! miss through the same load-balanced, resilience-wrapped path every
//! other downstream call uses, rather than a bespoke client.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};

use gateway_cache::AuthzSource;
use gateway_dispatch::RouteDispatcher;
use gateway_types::error::{GatewayError, Result as GatewayResult};

enum Kind {
    Roles,
    Permissions,
}

/// One instance per authz tier — roles and permissions hit different
/// internal identity-service paths.
pub struct DispatcherAuthzSource {
    dispatcher: Arc<RouteDispatcher>,
    identity_service_name: String,
    kind: Kind,
}

impl DispatcherAuthzSource {
    pub fn roles(dispatcher: Arc<RouteDispatcher>, identity_service_name: impl Into<String>) -> Self {
        Self {
            dispatcher,
            identity_service_name: identity_service_name.into(),
            kind: Kind::Roles,
        }
    }

    pub fn permissions(dispatcher: Arc<RouteDispatcher>, identity_service_name: impl Into<String>) -> Self {
        Self {
            dispatcher,
            identity_service_name: identity_service_name.into(),
            kind: Kind::Permissions,
        }
    }

    fn path(&self, user_id: &str) -> String {
        match self.kind {
            Kind::Roles => format!("/internal/roles/keycloak/{user_id}"),
            Kind::Permissions => format!("/internal/permissions/user/{user_id}"),
        }
    }
}

#[async_trait]
impl AuthzSource for DispatcherAuthzSource {
    async fn fetch(&self, user_id: &str) -> GatewayResult<HashSet<String>> {
        let response = self
            .dispatcher
            .dispatch(
                &self.identity_service_name,
                Method::GET,
                &self.path(user_id),
                HeaderMap::new(),
                Bytes::new(),
                None,
            )
            .await?;

        if !response.status.is_success() {
            return Err(GatewayError::Downstream(format!(
                "identity service returned {} for {user_id}",
                response.status
            )));
        }

        let values: Vec<String> = serde_json::from_slice(&response.body)
            .map_err(|e| GatewayError::Downstream(format!("undecodable authz response: {e}")))?;
        Ok(values.into_iter().collect())
    }
}
