//! Explicit per-request trace-id propagation.
//!
//! The source relies on an MDC-like thread-local to correlate log lines
//! with a request; on a multi-threaded async runtime there is no thread to
//! pin that to, so the trace id is carried explicitly: generated (or
//! adopted from an inbound header) once per request, stashed in request
//! extensions for handlers and the error mapper to read, echoed back in
//! the response, and forwarded to downstream services unchanged.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// A request's trace id, readable from request extensions by any handler
/// that wants to log or propagate it.
#[derive(Debug, Clone)]
pub struct TraceId(pub String);

/// Ensure every request carries a trace id: adopt an inbound `X-Trace-Id`
/// if present (so an upstream load balancer's id survives), otherwise mint
/// a fresh UUID. Stashes it in extensions and echoes it on the response.
pub async fn propagate_trace_id(mut req: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(TRACE_ID_HEADER);

    let trace_id = req
        .headers()
        .get(&header_name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        req.headers_mut().insert(header_name.clone(), value);
    }
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let mut response = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(header_name, value);
    }
    response
}
