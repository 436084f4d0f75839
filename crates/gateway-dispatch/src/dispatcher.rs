//! `RouteDispatcher`: name-based dispatch to a downstream endpoint.
//!
//! Resolves a logical service name via [`ServiceDiscovery`], round-robins
//! across the healthy instances it returns, and forwards the request
//! through that service's [`ResilienceEnvelope`]. A resolution of zero
//! endpoints is `ServiceUnavailable`, not a retryable error — there is
//! nothing to retry against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use http::{HeaderMap, Method, StatusCode};

use gateway_reliability::ResilienceEnvelope;
use gateway_types::error::{GatewayError, Result as GatewayResult};
use gateway_types::ports::service_discovery::{Endpoint, ServiceDiscovery};

/// Methods safe to retry without risking a duplicate side effect.
fn is_idempotent(method: &Method) -> bool {
    matches!(method, &Method::GET | &Method::HEAD | &Method::PUT | &Method::DELETE | &Method::OPTIONS)
}

/// Status codes worth a single bounded retry.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// A forwarded response, already stripped of hop-by-hop headers by the caller.
pub struct DownstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Round-robin cursor per service name.
#[derive(Default)]
struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    fn pick<'a>(&self, endpoints: &'a [Endpoint]) -> &'a Endpoint {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % endpoints.len();
        &endpoints[idx]
    }
}

/// Dispatches logical service calls to a healthy, load-balanced endpoint,
/// wrapped in that service's resilience envelope.
pub struct RouteDispatcher {
    discovery: Arc<dyn ServiceDiscovery>,
    http: reqwest::Client,
    envelopes: DashMap<String, Arc<ResilienceEnvelope>>,
    cursors: DashMap<String, Arc<RoundRobin>>,
    default_envelope_factory: Box<dyn Fn(&str) -> Arc<ResilienceEnvelope> + Send + Sync>,
    downstream_timeout: Duration,
}

impl RouteDispatcher {
    pub fn new(
        discovery: Arc<dyn ServiceDiscovery>,
        http: reqwest::Client,
        downstream_timeout: Duration,
        default_envelope_factory: impl Fn(&str) -> Arc<ResilienceEnvelope> + Send + Sync + 'static,
    ) -> Self {
        Self {
            discovery,
            http,
            envelopes: DashMap::new(),
            cursors: DashMap::new(),
            default_envelope_factory: Box::new(default_envelope_factory),
            downstream_timeout,
        }
    }

    fn envelope_for(&self, service_name: &str) -> Arc<ResilienceEnvelope> {
        self.envelopes
            .entry(service_name.to_string())
            .or_insert_with(|| (self.default_envelope_factory)(service_name))
            .clone()
    }

    fn cursor_for(&self, service_name: &str) -> Arc<RoundRobin> {
        self.cursors
            .entry(service_name.to_string())
            .or_insert_with(|| Arc::new(RoundRobin::default()))
            .clone()
    }

    /// Resolve, load-balance, and forward `body` to `service_name` at
    /// `path`, propagating the deadline in `timeout` (derived from the
    /// incoming request's remaining budget, minus administrative margin).
    pub async fn dispatch(
        &self,
        service_name: &str,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Bytes,
        deadline: Option<Duration>,
    ) -> GatewayResult<DownstreamResponse> {
        let endpoints = self.discovery.resolve(service_name).await?;
        if endpoints.is_empty() {
            return Err(GatewayError::ServiceUnavailable(service_name.to_string()));
        }

        let envelope = self.envelope_for(service_name);
        let cursor = self.cursor_for(service_name);
        let timeout = deadline.unwrap_or(self.downstream_timeout);
        let idempotent = is_idempotent(&method);

        let method = method.clone();
        let headers = headers.clone();
        let body = body.clone();

        let result = envelope
            .run(
                |e| idempotent && e.is_retryable(),
                || {
                    let endpoint = cursor.pick(&endpoints).clone();
                    let url = format!("{}{}", endpoint.base_url.trim_end_matches('/'), path);
                    let method = method.clone();
                    let headers = headers.clone();
                    let body = body.clone();
                    async move {
                        let resp = self
                            .http
                            .request(method, url.as_str())
                            .headers(headers)
                            .timeout(timeout)
                            .body(body)
                            .send()
                            .await
                            .map_err(|e| {
                                if e.is_timeout() {
                                    GatewayError::Downstream(format!("{service_name} timed out: {e}"))
                                } else {
                                    GatewayError::Downstream(format!("{service_name} request failed: {e}"))
                                }
                            })?;

                        let status = resp.status();
                        let resp_headers = resp.headers().clone();
                        let resp_body = resp
                            .bytes()
                            .await
                            .map_err(|e| GatewayError::Downstream(format!("{service_name} body read failed: {e}")))?;

                        if is_retryable_status(status) {
                            return Err(GatewayError::Downstream(format!(
                                "{service_name} returned retryable status {status}"
                            )));
                        }

                        Ok(DownstreamResponse {
                            status,
                            headers: resp_headers,
                            body: resp_body,
                        })
                    }
                },
            )
            .await;

        result
    }

    /// Snapshot of currently cached envelopes, for diagnostics/tests.
    pub fn known_services(&self) -> Vec<String> {
        self.envelopes.iter().map(|e| e.key().clone()).collect()
    }
}

/// Per-service resilience tuning, loaded from configuration, used by the
/// default envelope factory wired in `gateway-api`'s composition root.
#[derive(Debug, Clone)]
pub struct ServiceResilienceConfig {
    pub max_concurrent: usize,
    pub circuit_breaker: gateway_types::ports::circuit_breaker::CircuitBreakerConfig,
    pub rate_limit_per_second: u32,
    pub retry: gateway_reliability::RetryConfig,
}

impl Default for ServiceResilienceConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 64,
            circuit_breaker: gateway_types::ports::circuit_breaker::CircuitBreakerConfig::default(),
            rate_limit_per_second: 200,
            retry: gateway_reliability::RetryConfig::default(),
        }
    }
}

/// Per-service override table, keyed by logical service name.
pub type ServiceResilienceTable = HashMap<String, ServiceResilienceConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::InMemoryServiceDiscovery;
    use gateway_reliability::{AtomicCircuitBreaker, KeyedRateLimiter};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_dispatcher(discovery: Arc<dyn ServiceDiscovery>) -> RouteDispatcher {
        RouteDispatcher::new(discovery, reqwest::Client::new(), Duration::from_secs(5), |name| {
            Arc::new(ResilienceEnvelope::new(
                name,
                16,
                Arc::new(AtomicCircuitBreaker::with_real_clock(
                    name,
                    gateway_types::ports::circuit_breaker::CircuitBreakerConfig::default(),
                )),
                Arc::new(KeyedRateLimiter::new(1000, 1000)),
                gateway_reliability::RetryConfig {
                    max_attempts: 2,
                    base_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(5),
                },
            ))
        })
    }

    #[tokio::test]
    async fn zero_endpoints_is_service_unavailable() {
        let discovery = Arc::new(InMemoryServiceDiscovery::new());
        let dispatcher = make_dispatcher(discovery);
        let err = dispatcher
            .dispatch("business-service", Method::GET, "/things", HeaderMap::new(), Bytes::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn forwards_to_resolved_endpoint_and_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/things"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let discovery = Arc::new(InMemoryServiceDiscovery::new());
        discovery
            .set(
                "business-service",
                vec![Endpoint {
                    base_url: server.uri(),
                    id: "business-1".into(),
                }],
            )
            .await;

        let dispatcher = make_dispatcher(discovery);
        let resp = dispatcher
            .dispatch("business-service", Method::GET, "/things", HeaderMap::new(), Bytes::new(), None)
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, Bytes::from_static(b"ok"));
    }

    #[tokio::test]
    async fn retries_idempotent_get_on_server_error_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let discovery = Arc::new(InMemoryServiceDiscovery::new());
        discovery
            .set(
                "business-service",
                vec![Endpoint {
                    base_url: server.uri(),
                    id: "business-1".into(),
                }],
            )
            .await;

        let dispatcher = make_dispatcher(discovery);
        let resp = dispatcher
            .dispatch("business-service", Method::GET, "/flaky", HeaderMap::new(), Bytes::new(), None)
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body, Bytes::from_static(b"recovered"));
    }
}
