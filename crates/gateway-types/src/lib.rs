//! # Gateway Types
//!
//! Shared domain types and port traits for the BFF authentication gateway.
//! This crate provides the vocabulary (`Session`, `RoleSet`/`PermissionSet`,
//! metric key schema) and the hexagonal port traits (`CacheBackend`,
//! `SessionStore`, `AuthzSetCache`, `CircuitBreaker`, `RateLimiter`,
//! `ServiceDiscovery`, `HealthCheck`) that every other gateway crate depends
//! on, so adapters can be swapped without rippling through the codebase.
//!
//! ## Organization
//!
//! - `error`: unified error type and result alias
//! - `session`: `Session`, `SessionCookie`, and the L1 hot-path projection
//! - `authz`: `RoleSet`/`PermissionSet` and route-level authorization policy
//! - `metrics`: the shared-store key schema for the `MetricRecord` family
//! - `ports`: backend-agnostic trait definitions

pub mod authz;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod session;
pub mod token;

pub use authz::{AuthzPolicy, PermissionSet, RoleSet};
pub use error::{GatewayError, Result};
pub use session::{CachedAccessToken, Session, SessionCookie};
pub use token::{decode_access_token_claims, AccessTokenClaims};
