//! `MetricsCollector`: per-request fire-and-forget counter pipeline plus
//! the distributed CCU sampler.
//!
//! Every call to [`MetricsCollector::record`] spawns its work onto the
//! Tokio runtime and returns immediately — the request path never awaits
//! a store round-trip for telemetry (spec.md §8 invariant 5). Failures in
//! the spawned task are logged and swallowed; metrics collection must
//! never be the reason a request fails.

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::{redis::AsyncCommands, Pool};
use prometheus::IntGauge;
use tracing::warn;

use gateway_cache::CcuSampler;
use gateway_types::metrics::{
    error_count_key, latency_avg_key, request_count_key, rps_key, slow_endpoint_key, traffic_bucket_label,
    traffic_errors_key, traffic_requests_key, SlowEndpointMetric,
};

/// EMA smoothing factor, fixed per spec.md §4.7/glossary.
const EMA_ALPHA: f64 = 0.2;

const RPS_TTL_SECS: i64 = 2;
const TRAFFIC_TTL_SECS: i64 = 24 * 3600;
const SLOW_ENDPOINT_TTL_SECS: i64 = 3600;

/// Fire-and-forget counter pipeline plus the cluster-wide CCU sampler.
pub struct MetricsCollector {
    pool: Arc<Pool>,
    slow_endpoint_threshold_ms: u64,
    ccu_gauge: IntGauge,
}

impl MetricsCollector {
    pub fn new(pool: Arc<Pool>, slow_endpoint_threshold_ms: u64, ccu_gauge: IntGauge) -> Self {
        Self {
            pool,
            slow_endpoint_threshold_ms,
            ccu_gauge,
        }
    }

    /// Record one completed request. Returns immediately; the actual
    /// store writes happen on a spawned task.
    pub fn record(&self, method: &str, path: &str, latency: Duration, is_error: bool) {
        let pool = self.pool.clone();
        let method = method.to_string();
        let path = path.to_string();
        let threshold = self.slow_endpoint_threshold_ms;

        tokio::spawn(async move {
            if let Err(e) = Self::record_inner(&pool, &method, &path, latency, is_error, threshold).await {
                warn!("metrics collection failed (swallowed): {e}");
            }
        });
    }

    async fn record_inner(
        pool: &Pool,
        method: &str,
        path: &str,
        latency: Duration,
        is_error: bool,
        slow_threshold_ms: u64,
    ) -> anyhow::Result<()> {
        let mut conn = pool.get().await?;
        let bucket = traffic_bucket_label(chrono::Utc::now());

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCR")
            .arg(rps_key())
            .ignore()
            .cmd("EXPIRE")
            .arg(rps_key())
            .arg(RPS_TTL_SECS)
            .ignore()
            .cmd("INCR")
            .arg(request_count_key())
            .ignore()
            .cmd("INCR")
            .arg(traffic_requests_key(&bucket))
            .ignore()
            .cmd("EXPIRE")
            .arg(traffic_requests_key(&bucket))
            .arg(TRAFFIC_TTL_SECS)
            .ignore();

        if is_error {
            pipe.cmd("INCR")
                .arg(error_count_key())
                .ignore()
                .cmd("INCR")
                .arg(traffic_errors_key(&bucket))
                .ignore()
                .cmd("EXPIRE")
                .arg(traffic_errors_key(&bucket))
                .arg(TRAFFIC_TTL_SECS)
                .ignore();
        }

        pipe.query_async::<_, ()>(&mut *conn).await?;

        let latency_ms = latency.as_secs_f64() * 1000.0;
        Self::update_ema(&mut conn, latency_avg_key(), latency_ms, None).await?;

        if latency_ms > slow_threshold_ms as f64 {
            Self::update_slow_endpoint(&mut conn, method, path, latency_ms).await?;
        }

        Ok(())
    }

    /// Read-modify-write EMA update: `new = alpha*sample + (1-alpha)*old`.
    /// Not pipelined with the counters above because it needs the prior
    /// value before it can compute the next one.
    async fn update_ema(
        conn: &mut deadpool_redis::Connection,
        key: &str,
        sample: f64,
        ttl_secs: Option<i64>,
    ) -> anyhow::Result<f64> {
        let current: Option<String> = conn.get(key).await?;
        let previous: f64 = current.and_then(|s| s.parse().ok()).unwrap_or(sample);
        let updated = EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * previous;

        match ttl_secs {
            Some(ttl) => {
                let _: () = conn.set_ex(key, updated.to_string(), ttl as u64).await?;
            }
            None => {
                let _: () = conn.set(key, updated.to_string()).await?;
            }
        }
        Ok(updated)
    }

    async fn update_slow_endpoint(
        conn: &mut deadpool_redis::Connection,
        method: &str,
        path: &str,
        latency_ms: f64,
    ) -> anyhow::Result<()> {
        let avg_key = slow_endpoint_key(method, path, SlowEndpointMetric::Avg);
        let p95_key = slow_endpoint_key(method, path, SlowEndpointMetric::P95);
        let calls_key = slow_endpoint_key(method, path, SlowEndpointMetric::Calls);

        let new_avg = Self::update_ema(conn, &avg_key, latency_ms, Some(SLOW_ENDPOINT_TTL_SECS)).await?;
        // p95 tracked as the same EMA family over only the slow-request
        // population, a documented placeholder per spec.md §9.
        Self::update_ema(conn, &p95_key, latency_ms.max(new_avg), Some(SLOW_ENDPOINT_TTL_SECS)).await?;

        let _: i64 = conn.incr(&calls_key, 1).await?;
        let _: bool = conn.expire(&calls_key, SLOW_ENDPOINT_TTL_SECS).await?;

        Ok(())
    }

    /// Run one CCU sampling cycle if this instance can acquire the lease;
    /// otherwise it's a no-op (another instance is sampling this window).
    /// Spawn on a `tokio::time::interval` at `metrics.ccuScheduleInterval`.
    pub async fn sample_ccu_once(&self, sampler: &CcuSampler) {
        match sampler.try_sample().await {
            Ok(Some(count)) => self.ccu_gauge.set(count as i64),
            Ok(None) => {}
            Err(e) => warn!("ccu sampler tick failed: {e}"),
        }
    }

    pub fn ccu_gauge(&self) -> &IntGauge {
        &self.ccu_gauge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_formula_matches_documented_alpha() {
        let previous = 100.0;
        let sample = 500.0;
        let expected = EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * previous;
        assert!((expected - 180.0).abs() < 1e-9);
    }
}
