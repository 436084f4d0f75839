//! # Gateway Config
//!
//! Every setting enumerated in spec.md §6 "Configuration", loaded from
//! `GATEWAY_`-prefixed environment variables with documented defaults.
//! `dashboard.security.allowed-roles` is the one hot-reloadable field —
//! see [`dynamic::DynamicAllowedRoles`].
//!
//! ## Organization
//!
//! - `env`: prefixed environment-variable loading with type conversion
//! - `dynamic`: `ArcSwap`-backed hot-reloadable allowed-role list, watched with `notify`
//! - `discovery`: static service-name → endpoint-list table, loaded from env

pub mod discovery;
pub mod dynamic;
pub mod env;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use self::env::EnvConfigLoader;
pub use self::env::EnvError;
pub use dynamic::DynamicAllowedRoles;

/// `session.*` — session lifecycle and L1 cache sizing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `session.ttl`, default 24h of inactivity.
    pub ttl: Duration,
    /// `session.l1.ttl`, default 60s.
    pub l1_ttl: Duration,
    /// `session.l1.maxEntries`, default 100_000.
    pub l1_max_entries: usize,
}

/// `online.ttl` — CCU presence marker TTL, refreshed per request.
#[derive(Debug, Clone)]
pub struct OnlineConfig {
    pub ttl: Duration,
}

/// `idp.*` — OIDC identity provider endpoints and client credentials.
///
/// `client_secret` is intentionally excluded from `Debug` output so a
/// stray `{:?}` on the whole config never leaks it into logs.
#[derive(Clone)]
pub struct IdPConfig {
    pub authorize_uri: String,
    pub token_uri: String,
    pub revocation_uri: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl std::fmt::Debug for IdPConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdPConfig")
            .field("authorize_uri", &self.authorize_uri)
            .field("token_uri", &self.token_uri)
            .field("revocation_uri", &self.revocation_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// `authz.l1.ttl` / `authz.l2.ttl` — role/permission cache tiers.
#[derive(Debug, Clone)]
pub struct AuthzCacheConfig {
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
}

/// `dashboard.security.allowed-roles` plus the optional file it hot-reloads from.
#[derive(Debug, Clone)]
pub struct DashboardSecurityConfig {
    pub allowed_roles: Vec<String>,
    pub allowed_roles_file: Option<PathBuf>,
}

/// `metrics.*` — slow-endpoint threshold and CCU sampler scheduling.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub slow_endpoint_threshold_ms: u64,
    pub ccu_schedule_interval: Duration,
    pub ccu_lock_lease: Duration,
}

/// Top-level gateway configuration, assembled once at startup and shared
/// read-only through the rest of the process (except the hot-reloadable
/// pieces, which are `Arc`-wrapped for atomic swap).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub redis_url: String,
    pub session: SessionConfig,
    pub online: OnlineConfig,
    pub idp: IdPConfig,
    pub authz_cache: AuthzCacheConfig,
    pub dashboard_security: DashboardSecurityConfig,
    pub metrics: MetricsConfig,
    /// Administrative margin subtracted from the incoming request's
    /// remaining deadline before propagating it downstream (spec.md §5).
    pub downstream_deadline_margin: Duration,
    pub downstream_default_timeout: Duration,
    pub session_cookie_name: String,
    pub csrf_cookie_name: String,
    pub csrf_header_name: String,
    pub otel_endpoint: Option<String>,
    pub identity_service_name: String,
}

impl GatewayConfig {
    /// Load configuration from `GATEWAY_`-prefixed environment variables,
    /// applying the defaults documented in spec.md §6.
    pub fn from_env() -> Result<Self, EnvError> {
        let loader = EnvConfigLoader::new("GATEWAY_")
            .default("bind_addr", "0.0.0.0:8080")
            .default("redis_url", "redis://127.0.0.1:6379")
            .default("session_ttl_secs", "86400")
            .default("session_l1_ttl_secs", "60")
            .default("session_l1_max_entries", "100000")
            .default("online_ttl_secs", "300")
            .default("authz_l1_ttl_secs", "60")
            .default("authz_l2_ttl_secs", "3600")
            .default("dashboard_allowed_roles", "ADMIN,DEVELOPER")
            .default("metrics_slow_endpoint_threshold_ms", "500")
            .default("metrics_ccu_schedule_interval_secs", "30")
            .default("metrics_ccu_lock_lease_secs", "25")
            .default("downstream_deadline_margin_ms", "250")
            .default("downstream_default_timeout_secs", "10")
            .default("session_cookie_name", "SESSION_ID")
            .default("csrf_cookie_name", "XSRF-TOKEN")
            .default("csrf_header_name", "X-XSRF-TOKEN")
            .default("idp_client_id", "")
            .default("identity_service_name", "identity-service");

        let listen_addr = loader
            .get("bind_addr")?
            .parse()
            .map_err(|e| EnvError::InvalidValue {
                var: "GATEWAY_bind_addr".to_string(),
                reason: format!("not a socket address: {e}"),
            })?;

        Ok(Self {
            listen_addr,
            redis_url: loader.get("redis_url")?,
            session: SessionConfig {
                ttl: loader.get_seconds("session_ttl_secs")?,
                l1_ttl: loader.get_seconds("session_l1_ttl_secs")?,
                l1_max_entries: loader.get_usize("session_l1_max_entries")?,
            },
            online: OnlineConfig {
                ttl: loader.get_seconds("online_ttl_secs")?,
            },
            idp: IdPConfig {
                authorize_uri: loader.get("idp_authorize_uri")?,
                token_uri: loader.get("idp_token_uri")?,
                revocation_uri: loader.get_optional("idp_revocation_uri"),
                client_id: loader.get("idp_client_id")?,
                client_secret: loader.get("idp_client_secret")?,
                redirect_uri: loader.get("idp_redirect_uri")?,
            },
            authz_cache: AuthzCacheConfig {
                l1_ttl: loader.get_seconds("authz_l1_ttl_secs")?,
                l2_ttl: loader.get_seconds("authz_l2_ttl_secs")?,
            },
            dashboard_security: DashboardSecurityConfig {
                allowed_roles: loader.get_list("dashboard_allowed_roles")?,
                allowed_roles_file: loader.get_optional("dashboard_allowed_roles_file").map(PathBuf::from),
            },
            metrics: MetricsConfig {
                slow_endpoint_threshold_ms: loader.get_u64("metrics_slow_endpoint_threshold_ms")?,
                ccu_schedule_interval: loader.get_seconds("metrics_ccu_schedule_interval_secs")?,
                ccu_lock_lease: loader.get_seconds("metrics_ccu_lock_lease_secs")?,
            },
            downstream_deadline_margin: Duration::from_millis(loader.get_millis("downstream_deadline_margin_ms")?),
            downstream_default_timeout: loader.get_seconds("downstream_default_timeout_secs")?,
            session_cookie_name: loader.get("session_cookie_name")?,
            csrf_cookie_name: loader.get("csrf_cookie_name")?,
            csrf_header_name: loader.get("csrf_header_name")?,
            otel_endpoint: loader.get_optional("otel_endpoint"),
            identity_service_name: loader.get("identity_service_name")?,
        })
    }

    /// Wrap the startup allowed-role list in the hot-reloadable container
    /// and, if `dashboard_security.allowed_roles_file` is set, start the
    /// `notify`-backed watcher that keeps it current.
    pub fn install_dynamic_allowed_roles(&self) -> Arc<DynamicAllowedRoles> {
        let dynamic = DynamicAllowedRoles::new(self.dashboard_security.allowed_roles.clone());
        if let Some(path) = &self.dashboard_security.allowed_roles_file {
            let watcher = dynamic::watch_allowed_roles_file(path.clone(), dynamic.clone());
            // Leak the watcher handle: it must outlive the process for the
            // lifetime of the gateway, and main.rs holds no better owner.
            std::mem::forget(watcher);
        }
        dynamic
    }
}

/// `services.*` — static logical-name → endpoint-list table for
/// [`gateway_dispatch`]'s `ServiceDiscovery` adapter, one entry per
/// downstream the gateway proxies to.
pub fn load_service_table_from_env(prefix: &str) -> HashMap<String, Vec<String>> {
    discovery::load_service_table_from_env(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn debug_impl_redacts_client_secret() {
        let idp = IdPConfig {
            authorize_uri: "https://idp/auth".into(),
            token_uri: "https://idp/token".into(),
            revocation_uri: None,
            client_id: "gateway".into(),
            client_secret: "super-secret".into(),
            redirect_uri: "https://gw/auth/callback".into(),
        };
        let debug = format!("{idp:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn from_env_applies_documented_defaults() {
        // Isolate from whatever the outer test process's env holds.
        for var in ["GATEWAY_idp_authorize_uri", "GATEWAY_idp_token_uri", "GATEWAY_idp_redirect_uri"] {
            env::set_var(var, "https://idp.example/placeholder");
        }
        // Required since the client secret no longer defaults to empty
        // (a missing IdP secret must be a fatal startup error per spec.md §6).
        env::set_var("GATEWAY_idp_client_secret", "test-secret");
        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.session.ttl, Duration::from_secs(86400));
        assert_eq!(config.session.l1_ttl, Duration::from_secs(60));
        assert_eq!(config.session.l1_max_entries, 100_000);
        assert_eq!(config.metrics.slow_endpoint_threshold_ms, 500);
        assert_eq!(config.dashboard_security.allowed_roles, vec!["ADMIN".to_string(), "DEVELOPER".to_string()]);
    }
}
