//! Assembles the gateway's axum [`Router`] from the route handlers and
//! middleware defined elsewhere in this crate. Split out from `main.rs` so
//! tests can build a router against a fixture [`AppState`] without going
//! through process startup.

use axum::routing::{any, get, post};
use axum::Router;

use crate::middleware::{auth_filter, propagate_trace_id};
use crate::routes::{auth, dashboard, health, proxy};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/status", get(auth::status));

    let dashboard_routes = Router::new()
        .route("/api/v1/dashboard/realtime", get(dashboard::realtime))
        .route("/api/v1/dashboard/services", get(dashboard::services))
        .route("/api/v1/dashboard/traffic", get(dashboard::traffic))
        .route("/api/v1/dashboard/latency", get(dashboard::latency))
        .route("/api/v1/dashboard/database", get(dashboard::database))
        .route("/api/v1/dashboard/redis", get(dashboard::redis_info))
        .route("/api/v1/dashboard/slow-endpoints", get(dashboard::slow_endpoints));

    // Literal dashboard routes above take priority over this catch-all at
    // the same `/api/...` prefix; matchit resolves static segments before
    // named/wildcard ones.
    let proxy_routes = Router::new()
        .route("/api/{service}/{*rest}", any(proxy::proxy_with_rest))
        .route("/api/{service}", any(proxy::proxy_bare));

    Router::new()
        .route("/healthz", get(health::healthz))
        .merge(auth_routes)
        .merge(dashboard_routes)
        .merge(proxy_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth_filter))
        .layer(axum::middleware::from_fn(propagate_trace_id))
        .with_state(state)
}
