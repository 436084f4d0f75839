//! Shared-store key schema for the `MetricRecord` family.
//!
//! Centralized here so `gateway-metrics`' writer and reader sides (and any
//! future service embedding a `MetricsReporter`) can't drift apart on key
//! spelling.

use chrono::{DateTime, Utc};

/// Width of the traffic-history bucket used by `dashboard:traffic:history:*`.
pub const TRAFFIC_BUCKET_SECS: i64 = 300;

/// `online:{userId}` — CCU presence marker, TTL 2-5 min, refreshed per request.
pub fn online_key(user_id: &str) -> String {
    format!("online:{user_id}")
}

/// `dashboard:rps` — request-per-second counter, TTL 2 s.
pub fn rps_key() -> &'static str {
    "dashboard:rps"
}

/// `dashboard:request:count` — all-time request counter, no TTL.
pub fn request_count_key() -> &'static str {
    "dashboard:request:count"
}

/// `dashboard:error:count` — all-time error counter, no TTL.
pub fn error_count_key() -> &'static str {
    "dashboard:error:count"
}

/// `dashboard:latency:avg` — EMA latency value, no TTL.
pub fn latency_avg_key() -> &'static str {
    "dashboard:latency:avg"
}

/// Floor a timestamp to its 5-minute bucket label used by traffic history.
pub fn traffic_bucket_label(at: DateTime<Utc>) -> String {
    let bucket_start = (at.timestamp() / TRAFFIC_BUCKET_SECS) * TRAFFIC_BUCKET_SECS;
    bucket_start.to_string()
}

/// `dashboard:traffic:history:{bucket}:requests`, TTL 24 h.
pub fn traffic_requests_key(bucket: &str) -> String {
    format!("dashboard:traffic:history:{bucket}:requests")
}

/// `dashboard:traffic:history:{bucket}:errors`, TTL 24 h.
pub fn traffic_errors_key(bucket: &str) -> String {
    format!("dashboard:traffic:history:{bucket}:errors")
}

/// `dashboard:service:{name}:health`, TTL 30 s, written by that service's
/// own `MetricsReporter` only.
pub fn service_health_key(service: &str) -> String {
    format!("dashboard:service:{service}:health")
}

/// `dashboard:service:{name}:db`, TTL 30 s.
pub fn service_db_key(service: &str) -> String {
    format!("dashboard:service:{service}:db")
}

/// `dashboard:service:{name}:latency`, TTL 30 s.
pub fn service_latency_key(service: &str) -> String {
    format!("dashboard:service:{service}:latency")
}

/// Slow-endpoint metric kind tracked per `{METHOD}:{path}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowEndpointMetric {
    Avg,
    P95,
    Calls,
}

impl SlowEndpointMetric {
    fn as_str(self) -> &'static str {
        match self {
            SlowEndpointMetric::Avg => "avg",
            SlowEndpointMetric::P95 => "p95",
            SlowEndpointMetric::Calls => "calls",
        }
    }
}

/// `dashboard:slow:endpoint:{METHOD}:{path}:{avg|p95|calls}`, TTL 1 h.
pub fn slow_endpoint_key(method: &str, path: &str, metric: SlowEndpointMetric) -> String {
    format!(
        "dashboard:slow:endpoint:{}:{}:{}",
        method.to_uppercase(),
        path,
        metric.as_str()
    )
}

/// Cluster-wide CCU sampler lease key, acquired with `SET NX PX`.
pub fn ccu_sampler_lock_key() -> &'static str {
    "ccu:metrics:lock"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn traffic_bucket_floors_to_five_minutes() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 10, 7, 30).unwrap();
        let bucket = traffic_bucket_label(at);
        let floored = Utc.with_ymd_and_hms(2026, 1, 1, 10, 5, 0).unwrap();
        assert_eq!(bucket, floored.timestamp().to_string());
    }

    #[test]
    fn slow_endpoint_key_uppercases_method() {
        let key = slow_endpoint_key("get", "/api/v1/things", SlowEndpointMetric::P95);
        assert_eq!(key, "dashboard:slow:endpoint:GET:/api/v1/things:p95");
    }
}
