//! Composition root's shared application state and the route policy table
//! `AuthFilter` consults to decide whether a path needs a session at all
//! and, if so, which authorization policy applies.

use std::sync::Arc;

use deadpool_redis::Pool;
use gateway_cache::OAuthStateStore;
use gateway_config::{DynamicAllowedRoles, GatewayConfig};
use gateway_dispatch::RouteDispatcher;
use gateway_idp::OidcIdPClient;
use gateway_metrics::{MetricsAggregator, MetricsCollector, RequestTally};
use gateway_types::ports::{AuthzSetCache, SessionStore};

/// How `AuthFilter` treats a matched path, resolved by longest-prefix
/// lookup in [`RoutePolicyTable`] — policy is attached to the route, not
/// discovered by reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// No session required at all (login kickoff, the callback itself,
    /// liveness/scrape endpoints).
    Public,
    /// A valid session is required; any authenticated principal passes.
    AuthenticatedOnly,
    /// A valid session is required and the principal's roles must
    /// intersect the current [`DynamicAllowedRoles`] snapshot.
    DashboardRole,
}

/// Longest-prefix-match route table. Built once at startup from a fixed
/// list — the gateway's own routes plus the downstream proxy catch-all —
/// rather than discovered from annotations.
pub struct RoutePolicyTable {
    rules: Vec<(&'static str, RouteKind)>,
}

impl RoutePolicyTable {
    pub fn new() -> Self {
        Self {
            rules: vec![
                ("/auth/login", RouteKind::Public),
                ("/auth/callback", RouteKind::Public),
                ("/healthz", RouteKind::Public),
                ("/metrics", RouteKind::Public),
                ("/auth/logout", RouteKind::AuthenticatedOnly),
                ("/auth/me", RouteKind::AuthenticatedOnly),
                ("/auth/status", RouteKind::AuthenticatedOnly),
                ("/api/v1/dashboard", RouteKind::DashboardRole),
            ],
        }
    }

    /// Resolve the policy for `path` by longest matching prefix, falling
    /// back to [`RouteKind::AuthenticatedOnly`] for anything unlisted —
    /// this covers the downstream proxy catch-all (`/api/{service}/...`),
    /// which requires a session but no specific role.
    pub fn classify(&self, path: &str) -> RouteKind {
        self.rules
            .iter()
            .filter(|(prefix, _)| path == *prefix || path.starts_with(&format!("{prefix}/")))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, kind)| *kind)
            .unwrap_or(RouteKind::AuthenticatedOnly)
    }
}

impl Default for RoutePolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated principal attached to request extensions by `AuthFilter`
/// once a session has been validated (and refreshed, if necessary), so
/// downstream handlers in this process never re-touch the session store.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub session_id: String,
    pub user_id: String,
    pub access_token: String,
}

/// Everything a request handler or the `AuthFilter` middleware needs,
/// assembled once in `main.rs` and shared via axum's `State` extractor.
/// Every field is already `Arc`-wrapped, so cloning `AppState` is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub roles: Arc<dyn AuthzSetCache>,
    pub permissions: Arc<dyn AuthzSetCache>,
    pub idp: Arc<OidcIdPClient>,
    pub oauth_state: Arc<OAuthStateStore>,
    pub dispatcher: Arc<RouteDispatcher>,
    pub allowed_roles: Arc<DynamicAllowedRoles>,
    pub metrics_collector: Arc<MetricsCollector>,
    /// Shared with the gateway's own `MetricsReporter`, so `dashboard:service:bff-gateway:health`
    /// reflects the requests this process actually handled instead of staying at zero.
    pub tally: Arc<RequestTally>,
    pub aggregator: Arc<MetricsAggregator>,
    pub policy: Arc<RoutePolicyTable>,
    /// Raw pool handle, used only by the liveness probe — everything else
    /// goes through a port trait.
    pub pool: Arc<Pool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_exact_and_prefixed_routes() {
        let table = RoutePolicyTable::new();
        assert_eq!(table.classify("/auth/login"), RouteKind::Public);
        assert_eq!(table.classify("/auth/callback"), RouteKind::Public);
        assert_eq!(table.classify("/auth/me"), RouteKind::AuthenticatedOnly);
        assert_eq!(table.classify("/api/v1/dashboard/realtime"), RouteKind::DashboardRole);
        assert_eq!(table.classify("/api/business-service/things"), RouteKind::AuthenticatedOnly);
    }

    #[test]
    fn longest_prefix_wins_over_shorter_overlap() {
        let table = RoutePolicyTable::new();
        // "/api/v1/dashboard" is more specific than any hypothetical "/api" rule.
        assert_eq!(table.classify("/api/v1/dashboard/services"), RouteKind::DashboardRole);
    }
}
