//! `MetricsAggregator`: read-side handlers for dashboard queries.
//!
//! Every handler issues at most one `SCAN` (cursor-driven, batch 100) plus
//! one pipelined multi-get, per spec.md §8 invariant 6 — no handler ever
//! falls back to `KEYS` or issues one round-trip per key.

use std::collections::HashMap;
use std::sync::Arc;

use deadpool_redis::{redis::AsyncCommands, Pool};
use tokio::sync::Semaphore;

use gateway_types::metrics::{
    error_count_key, latency_avg_key, request_count_key, rps_key, slow_endpoint_key, traffic_bucket_label,
    traffic_errors_key, traffic_requests_key, SlowEndpointMetric, TRAFFIC_BUCKET_SECS,
};

use crate::dto::{
    DatabaseDto, LatencyDto, LatencySample, RealtimeDto, RedisInfoDto, ServiceDbSnapshot, ServiceHealthSnapshot,
    ServicesDto, SlowEndpointEntry, SlowEndpointsDto, TrafficDto, TrafficPoint,
};

const SCAN_BATCH: u32 = 100;
const TRAFFIC_HISTORY_BUCKETS: i64 = 288; // 24h of 5-minute buckets.

/// Read-side aggregation for the operational dashboard.
pub struct MetricsAggregator {
    pool: Arc<Pool>,
    /// Bounds the blocking-pool work `redis_info`'s `INFO` parsing offloads
    /// to `spawn_blocking`, sized `10 * num_cpus` per the documented rule.
    blocking_permits: Arc<Semaphore>,
}

impl MetricsAggregator {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self {
            pool,
            blocking_permits: Arc::new(Semaphore::new(10 * num_cpus::get())),
        }
    }

    async fn conn(&self) -> anyhow::Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Cursor-driven `SCAN` over `pattern`, batch size [`SCAN_BATCH`].
    async fn scan_keys(conn: &mut deadpool_redis::Connection, pattern: &str) -> anyhow::Result<Vec<String>> {
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut **conn)
                .await?;
            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(keys)
    }

    /// `realtime`: CCU via SCAN, one multi-get for the four scalar counters.
    pub async fn realtime(&self) -> anyhow::Result<RealtimeDto> {
        let mut conn = self.conn().await?;
        let online_keys = Self::scan_keys(&mut conn, "online:*").await?;

        let values: Vec<Option<String>> = conn
            .mget(&[rps_key(), latency_avg_key(), error_count_key(), request_count_key()])
            .await?;

        let rps = parse_or(&values[0], 0i64);
        let avg_latency = parse_or(&values[1], 0.0f64);
        let errors = parse_or(&values[2], 0i64);
        let requests = parse_or(&values[3], 0i64);
        let error_rate = errors as f64 / requests.max(1) as f64;

        Ok(RealtimeDto {
            concurrent_users: online_keys.len(),
            requests_per_second: rps,
            total_requests: requests,
            total_errors: errors,
            error_rate,
            avg_latency_ms: avg_latency,
        })
    }

    /// `services`: SCAN `dashboard:service:*:health`, one multi-get, parse JSON per entry.
    pub async fn services(&self) -> anyhow::Result<ServicesDto> {
        let mut conn = self.conn().await?;
        let keys = Self::scan_keys(&mut conn, "dashboard:service:*:health").await?;
        if keys.is_empty() {
            return Ok(ServicesDto { services: Vec::new() });
        }

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let values: Vec<Option<String>> = conn.mget(&key_refs).await?;

        let mut services: Vec<ServiceHealthSnapshot> = values
            .into_iter()
            .flatten()
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ServicesDto { services })
    }

    /// `traffic`: enumerate the last 288 five-minute buckets, one
    /// round-trip multi-get of all 576 keys, emit only nonzero points.
    pub async fn traffic(&self) -> anyhow::Result<TrafficDto> {
        let mut conn = self.conn().await?;
        let now = chrono::Utc::now();

        let mut bucket_labels = Vec::with_capacity(TRAFFIC_HISTORY_BUCKETS as usize);
        for i in 0..TRAFFIC_HISTORY_BUCKETS {
            let at = now - chrono::Duration::seconds(i * TRAFFIC_BUCKET_SECS);
            bucket_labels.push(traffic_bucket_label(at));
        }
        bucket_labels.dedup();

        let mut keys = Vec::with_capacity(bucket_labels.len() * 2);
        for bucket in &bucket_labels {
            keys.push(traffic_requests_key(bucket));
            keys.push(traffic_errors_key(bucket));
        }
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let values: Vec<Option<String>> = conn.mget(&key_refs).await?;

        let mut points = Vec::new();
        for (i, bucket) in bucket_labels.iter().enumerate() {
            let requests = parse_or(&values[i * 2], 0i64);
            let errors = parse_or(&values[i * 2 + 1], 0i64);
            if requests != 0 || errors != 0 {
                points.push(TrafficPoint {
                    bucket: bucket.clone(),
                    requests,
                    errors,
                });
            }
        }
        points.sort_by(|a, b| a.bucket.cmp(&b.bucket));
        Ok(TrafficDto { points })
    }

    /// `latency`: SCAN per-service latency keys plus the gateway's own,
    /// one multi-get, compose {p50=avg, p95=avg*1.5, p99=avg*2} per the
    /// documented placeholder (spec.md §9 Open Question).
    pub async fn latency(&self) -> anyhow::Result<LatencyDto> {
        let mut conn = self.conn().await?;
        let mut keys = Self::scan_keys(&mut conn, "dashboard:service:*:latency").await?;
        keys.push(latency_avg_key().to_string());

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let values: Vec<Option<String>> = conn.mget(&key_refs).await?;

        let mut samples = Vec::new();
        for (key, value) in keys.iter().zip(values.iter()) {
            let Some(avg) = value.as_ref().and_then(|v| v.parse::<f64>().ok()) else {
                continue;
            };
            let service_name = service_name_from_latency_key(key);
            samples.push(LatencySample {
                service_name,
                p50_ms: avg,
                p95_ms: avg * 1.5,
                p99_ms: avg * 2.0,
            });
        }
        samples.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(LatencyDto { samples })
    }

    /// `database`: SCAN `dashboard:service:*:db`, one multi-get, sort by service name.
    pub async fn database(&self) -> anyhow::Result<DatabaseDto> {
        let mut conn = self.conn().await?;
        let keys = Self::scan_keys(&mut conn, "dashboard:service:*:db").await?;
        if keys.is_empty() {
            return Ok(DatabaseDto { services: Vec::new() });
        }

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let values: Vec<Option<String>> = conn.mget(&key_refs).await?;

        let mut services: Vec<ServiceDbSnapshot> = values
            .into_iter()
            .flatten()
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        services.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        Ok(DatabaseDto { services })
    }

    /// `redis`: the shared store's own `INFO` output, parsed for the
    /// fields the dashboard cares about. Parsing runs on the blocking pool,
    /// bounded by `blocking_permits`, since `INFO` output size is unbounded
    /// across Redis versions and configurations.
    pub async fn redis_info(&self) -> anyhow::Result<RedisInfoDto> {
        let mut conn = self.conn().await?;
        let info: String = redis::cmd("INFO").query_async(&mut *conn).await?;

        let _permit = self.blocking_permits.clone().acquire_owned().await?;
        Ok(tokio::task::spawn_blocking(move || parse_redis_info(&info)).await?)
    }

    /// `slow-endpoints`: SCAN the `:avg` keys, read the sibling `:p95`/`:calls`, sort descending.
    pub async fn slow_endpoints(&self) -> anyhow::Result<SlowEndpointsDto> {
        let mut conn = self.conn().await?;
        let avg_keys = Self::scan_keys(&mut conn, "dashboard:slow:endpoint:*:avg").await?;
        if avg_keys.is_empty() {
            return Ok(SlowEndpointsDto { endpoints: Vec::new() });
        }

        let mut all_keys = Vec::with_capacity(avg_keys.len() * 3);
        let mut triples = Vec::with_capacity(avg_keys.len());
        for avg_key in &avg_keys {
            let Some((method, path)) = parse_slow_endpoint_avg_key(avg_key) else {
                continue;
            };
            let p95_key = slow_endpoint_key(&method, &path, SlowEndpointMetric::P95);
            let calls_key = slow_endpoint_key(&method, &path, SlowEndpointMetric::Calls);
            triples.push((method, path, avg_key.clone(), p95_key.clone(), calls_key.clone()));
            all_keys.push(avg_key.clone());
            all_keys.push(p95_key);
            all_keys.push(calls_key);
        }

        let key_refs: Vec<&str> = all_keys.iter().map(String::as_str).collect();
        let values: Vec<Option<String>> = conn.mget(&key_refs).await?;

        let mut endpoints = Vec::with_capacity(triples.len());
        for (i, (method, path, ..)) in triples.into_iter().enumerate() {
            let avg = parse_or(&values[i * 3], 0.0f64);
            let p95 = parse_or(&values[i * 3 + 1], 0.0f64);
            let calls = parse_or(&values[i * 3 + 2], 0i64);
            endpoints.push(SlowEndpointEntry {
                method,
                path,
                avg_ms: avg,
                p95_ms: p95,
                calls,
            });
        }
        endpoints.sort_by(|a, b| b.avg_ms.partial_cmp(&a.avg_ms).unwrap_or(std::cmp::Ordering::Equal));
        Ok(SlowEndpointsDto { endpoints })
    }
}

fn parse_or<T: std::str::FromStr>(value: &Option<String>, default: T) -> T {
    value.as_ref().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn service_name_from_latency_key(key: &str) -> String {
    // `dashboard:service:{name}:latency` or the gateway's own `dashboard:latency:avg`.
    if key == latency_avg_key() {
        return "gateway".to_string();
    }
    key.strip_prefix("dashboard:service:")
        .and_then(|rest| rest.strip_suffix(":latency"))
        .unwrap_or(key)
        .to_string()
}

fn parse_slow_endpoint_avg_key(key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix("dashboard:slow:endpoint:")?;
    let rest = rest.strip_suffix(":avg")?;
    let (method, path) = rest.split_once(':')?;
    Some((method.to_string(), path.to_string()))
}

fn parse_redis_info(info: &str) -> RedisInfoDto {
    let fields: HashMap<&str, &str> = info
        .lines()
        .filter_map(|line| line.split_once(':'))
        .collect();

    let get_u64 = |key: &str| fields.get(key).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(0);

    let hits = get_u64("keyspace_hits");
    let misses = get_u64("keyspace_misses");
    let hit_rate = if hits + misses == 0 {
        0.0
    } else {
        hits as f64 / (hits + misses) as f64
    };

    RedisInfoDto {
        connected_clients: get_u64("connected_clients"),
        used_memory_bytes: get_u64("used_memory"),
        max_memory_bytes: get_u64("maxmemory"),
        keyspace_hits: hits,
        keyspace_misses: misses,
        hit_rate,
        evicted_keys: get_u64("evicted_keys"),
        ops_per_second: get_u64("instantaneous_ops_per_sec"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_key_recovers_service_name() {
        assert_eq!(
            service_name_from_latency_key("dashboard:service:business-service:latency"),
            "business-service"
        );
        assert_eq!(service_name_from_latency_key("dashboard:latency:avg"), "gateway");
    }

    #[test]
    fn slow_endpoint_avg_key_parses_method_and_path() {
        let (method, path) =
            parse_slow_endpoint_avg_key("dashboard:slow:endpoint:GET:/api/v1/things:avg").unwrap();
        assert_eq!(method, "GET");
        assert_eq!(path, "/api/v1/things");
    }

    #[test]
    fn redis_info_computes_hit_rate() {
        let info = "connected_clients:5\r\nused_memory:1024\r\nmaxmemory:0\r\nkeyspace_hits:80\r\nkeyspace_misses:20\r\nevicted_keys:0\r\ninstantaneous_ops_per_sec:42\r\n";
        let parsed = parse_redis_info(info);
        assert_eq!(parsed.connected_clients, 5);
        assert_eq!(parsed.hit_rate, 0.8);
        assert_eq!(parsed.ops_per_second, 42);
    }

    #[test]
    fn parse_or_falls_back_on_missing_value() {
        let value: Option<String> = None;
        assert_eq!(parse_or(&value, 7i64), 7);
    }
}
