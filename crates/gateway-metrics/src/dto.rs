//! Wire DTOs written by [`crate::reporter::MetricsReporter`] and read by
//! [`crate::aggregator::MetricsAggregator`]'s dashboard query handlers.
//!
//! All plain `serde`-derived value records, no ORM mapping, matching the
//! rest of this workspace's cached/cacheable types.

use serde::{Deserialize, Serialize};

/// `dashboard:service:{name}:health` snapshot, written every 5s by that
/// service's own `MetricsReporter`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceHealthSnapshot {
    pub name: String,
    pub status: String,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub uptime_secs: u64,
    pub requests: u64,
    pub errors: u64,
}

/// `dashboard:service:{name}:db` snapshot. Only written when the
/// reporting service has a datasource configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDbSnapshot {
    pub service_name: String,
    pub connections: u32,
    pub max_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
    pub pool_usage_percent: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_queries: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slow_queries: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_hit_rate: Option<f32>,
}

/// `GET /api/v1/dashboard/realtime`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeDto {
    pub concurrent_users: usize,
    pub requests_per_second: i64,
    pub total_requests: i64,
    pub total_errors: i64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
}

/// `GET /api/v1/dashboard/services`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicesDto {
    pub services: Vec<ServiceHealthSnapshot>,
}

/// One point on the 24h traffic history chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficPoint {
    pub bucket: String,
    pub requests: i64,
    pub errors: i64,
}

/// `GET /api/v1/dashboard/traffic`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficDto {
    pub points: Vec<TrafficPoint>,
}

/// Approximate latency percentiles, derived from the EMA mean per
/// spec.md §4.8/§9 (documented placeholder pending a streaming quantile
/// estimator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencySample {
    pub service_name: String,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// `GET /api/v1/dashboard/latency`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencyDto {
    pub samples: Vec<LatencySample>,
}

/// `GET /api/v1/dashboard/database`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseDto {
    pub services: Vec<ServiceDbSnapshot>,
}

/// `GET /api/v1/dashboard/redis`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RedisInfoDto {
    pub connected_clients: u64,
    pub used_memory_bytes: u64,
    pub max_memory_bytes: u64,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub hit_rate: f64,
    pub evicted_keys: u64,
    pub ops_per_second: u64,
}

/// One entry in the slow-endpoint table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlowEndpointEntry {
    pub method: String,
    pub path: String,
    pub avg_ms: f64,
    pub p95_ms: f64,
    pub calls: i64,
}

/// `GET /api/v1/dashboard/slow-endpoints`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlowEndpointsDto {
    pub endpoints: Vec<SlowEndpointEntry>,
}
