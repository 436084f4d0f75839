//! HTTP route handlers, grouped by surface: OIDC/session endpoints,
//! dashboard read views, the downstream proxy, and liveness.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod proxy;
