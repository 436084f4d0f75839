use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gateway_cache::{build_pool, run_invalidation_listener, CcuSampler, OAuthStateStore, RedisAuthzCache, RedisSessionStore, SessionStoreConfig};
use gateway_config::{discovery::load_service_table_from_env, GatewayConfig};
use gateway_dispatch::{RouteDispatcher, ServiceResilienceConfig, StaticServiceDiscovery};
use gateway_idp::OidcIdPClient;
use gateway_metrics::{MetricsAggregator, MetricsCollector, MetricsReporter, RequestTally};
use gateway_reliability::{AtomicCircuitBreaker, KeyedRateLimiter, ResilienceEnvelope};
use gateway_types::ports::{service_discovery::Endpoint, AuthzSetCache};

use gateway_api::identity_source::DispatcherAuthzSource;
use gateway_api::router::build_router;
use gateway_api::state::{AppState, RoutePolicyTable};

/// 50MB body limit for proxied payloads, matching the generous bound
/// downstream services already accept for uploads.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

const GATEWAY_SERVICE_NAME: &str = "bff-gateway";

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Backend-for-frontend authentication/authorization gateway")]
struct Args {
    /// Present for operational parity with this workspace's other
    /// services; configuration itself is env-driven (see `gateway-config`).
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    bind: Option<String>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn endpoint_table(raw: HashMap<String, Vec<String>>) -> HashMap<String, Vec<Endpoint>> {
    raw.into_iter()
        .map(|(name, urls)| {
            let endpoints = urls
                .into_iter()
                .enumerate()
                .map(|(i, base_url)| Endpoint {
                    id: format!("{name}-{i}"),
                    base_url,
                })
                .collect();
            (name, endpoints)
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = GatewayConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.listen_addr = bind.parse()?;
    }

    tracing::info!(bind = %config.listen_addr, redis = %config.redis_url, "starting bff gateway");

    let pool = Arc::new(build_pool(&config.redis_url)?);

    let sessions: Arc<dyn gateway_types::ports::SessionStore> = Arc::new(RedisSessionStore::new(
        pool.clone(),
        SessionStoreConfig {
            session_ttl: config.session.ttl,
            l1_ttl: config.session.l1_ttl,
            l1_max_entries: config.session.l1_max_entries,
            online_ttl: config.online.ttl,
        },
    ));

    let idp = Arc::new(OidcIdPClient::new(
        config.idp.token_uri.clone(),
        config.idp.revocation_uri.clone(),
        config.idp.client_id.clone(),
        config.idp.client_secret.clone(),
        config.idp.redirect_uri.clone(),
    )?);

    let oauth_state = Arc::new(OAuthStateStore::new(pool.clone()));

    let service_table = endpoint_table(load_service_table_from_env("GATEWAY_SERVICE_"));
    let discovery = Arc::new(StaticServiceDiscovery::new(service_table));

    let downstream_timeout = config.downstream_default_timeout;
    let dispatcher = Arc::new(RouteDispatcher::new(
        discovery,
        reqwest::Client::new(),
        downstream_timeout,
        |name| {
            let resilience = ServiceResilienceConfig::default();
            Arc::new(ResilienceEnvelope::new(
                name,
                resilience.max_concurrent,
                Arc::new(AtomicCircuitBreaker::with_real_clock(name, resilience.circuit_breaker)),
                Arc::new(KeyedRateLimiter::new(resilience.rate_limit_per_second, resilience.rate_limit_per_second)),
                resilience.retry,
            ))
        },
    ));

    let roles: Arc<dyn AuthzSetCache> = Arc::new(RedisAuthzCache::new(
        pool.clone(),
        Arc::new(DispatcherAuthzSource::roles(dispatcher.clone(), config.identity_service_name.clone())),
        "authz:roles:",
        config.authz_cache.l1_ttl,
        config.authz_cache.l2_ttl,
    ));
    let permissions: Arc<dyn AuthzSetCache> = Arc::new(RedisAuthzCache::new(
        pool.clone(),
        Arc::new(DispatcherAuthzSource::permissions(dispatcher.clone(), config.identity_service_name.clone())),
        "authz:perms:",
        config.authz_cache.l1_ttl,
        config.authz_cache.l2_ttl,
    ));

    tokio::spawn(run_invalidation_listener(config.redis_url.clone(), roles.clone(), permissions.clone()));

    let allowed_roles = config.install_dynamic_allowed_roles();

    let ccu_gauge = prometheus::IntGauge::new("gateway_concurrent_users", "sampled concurrent users")
        .expect("static gauge name/help are valid");
    let metrics_collector = Arc::new(MetricsCollector::new(pool.clone(), config.metrics.slow_endpoint_threshold_ms, ccu_gauge));
    let aggregator = Arc::new(MetricsAggregator::new(pool.clone()));

    let node_id = uuid::Uuid::new_v4().to_string();
    let ccu_sampler = CcuSampler::new(pool.clone(), node_id, config.metrics.ccu_lock_lease);
    let ccu_interval = config.metrics.ccu_schedule_interval;
    let ccu_collector = metrics_collector.clone();
    let ccu_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ccu_interval);
        loop {
            ticker.tick().await;
            ccu_collector.sample_ccu_once(&ccu_sampler).await;
        }
    });

    let tally = Arc::new(RequestTally::default());
    let reporter = Arc::new(MetricsReporter::new(pool.clone(), GATEWAY_SERVICE_NAME, tally.clone()));
    let reporter_task = reporter.spawn();

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app_state = AppState {
        config: Arc::new(config.clone()),
        sessions,
        roles,
        permissions,
        idp,
        oauth_state,
        dispatcher,
        allowed_roles,
        metrics_collector,
        tally,
        aggregator,
        policy: Arc::new(RoutePolicyTable::new()),
        pool: pool.clone(),
    };

    let app = build_router(app_state)
        .route("/metrics", axum::routing::get(move || async move { metric_handle.render() }))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(downstream_timeout + config.downstream_deadline_margin))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "bff gateway listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    ccu_task.abort();
    reporter_task.abort();
    pool.close();

    tracing::info!("bff gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install ctrl-c handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut handler) => {
                handler.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install sigterm handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
        _ = terminate => tracing::info!("received sigterm, shutting down"),
    }
}
