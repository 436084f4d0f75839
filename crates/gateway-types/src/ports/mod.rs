//! Port interfaces for dependency inversion.
//!
//! Concrete implementations live in the adapter crates (`gateway-cache`,
//! `gateway-idp`, `gateway-reliability`, `gateway-dispatch`).

pub mod authz_cache;
pub mod cache;
pub mod circuit_breaker;
pub mod health;
pub mod rate_limit;
pub mod service_discovery;
pub mod session;

pub use authz_cache::AuthzSetCache;
pub use cache::CacheBackend;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use health::{HealthCheck, HealthRegistry, HealthStatus};
pub use rate_limit::{RateLimitStats, RateLimiter};
pub use service_discovery::{Endpoint, ServiceDiscovery};
pub use session::SessionStore;
