//! # Gateway Cache
//!
//! Two-tier (L1 process-local / L2 Redis) caching for the BFF gateway:
//! session records, role/permission sets, the cluster-wide CCU sampler, and
//! the pub/sub listener that keeps role/permission L1 entries fresh across
//! instances.
//!
//! ## Organization
//!
//! - `l1`: bounded, TTL-expiring in-memory cache shared by the tiers below
//! - `redis_pool`: shared deadpool-redis pool construction
//! - `session_store`: [`SessionStore`](gateway_types::ports::SessionStore) implementation
//! - `authz_cache`: generic role/permission two-tier cache
//! - `invalidation`: `authz:invalidate` pub/sub listener
//! - `ccu`: cluster-wide concurrent-user sampler with a Redis lease
//! - `oauth_state`: login/callback PKCE correlation store

pub mod authz_cache;
pub mod ccu;
pub mod invalidation;
pub mod l1;
pub mod oauth_state;
pub mod redis_pool;
pub mod session_store;

pub use authz_cache::{AuthzSource, RedisAuthzCache};
pub use ccu::CcuSampler;
pub use oauth_state::OAuthStateStore;
pub use redis_pool::build_pool;
pub use session_store::{RedisSessionStore, SessionStoreConfig};
