//! The generic downstream proxy: `/api/{service}/**` forwarded to whatever
//! [`gateway_dispatch::RouteDispatcher`] resolves `{service}` to, with the
//! gateway's own bearer token injected by `AuthFilter` already sitting in
//! the `Authorization` header by the time a handler here runs.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, Method, Response as HttpResponse, StatusCode},
    response::{IntoResponse, Response},
};

use crate::errors::ApiError;
use crate::state::AppState;

/// Headers meaningful only to a single hop, stripped in both directions
/// per RFC 7230 §6.1 plus `Host`, which must be re-derived from whatever
/// endpoint the dispatcher actually picks.
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-authenticate");
    headers.remove("proxy-authorization");
}

async fn forward(state: AppState, service: String, downstream_path: String, method: Method, mut headers: HeaderMap, body: Bytes) -> Response {
    strip_hop_by_hop(&mut headers);

    let deadline = state
        .config
        .downstream_default_timeout
        .checked_sub(state.config.downstream_deadline_margin);

    let result = state
        .dispatcher
        .dispatch(&service, method, &downstream_path, headers, body, deadline)
        .await;

    match result {
        Ok(mut downstream) => {
            strip_hop_by_hop(&mut downstream.headers);
            let status = StatusCode::from_u16(downstream.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut builder = HttpResponse::builder().status(status);
            if let Some(response_headers) = builder.headers_mut() {
                *response_headers = downstream.headers;
            }
            builder
                .body(axum::body::Body::from(downstream.body))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// `/api/{service}/{*rest}` — the common case, a sub-path beneath the
/// service root.
pub async fn proxy_with_rest(
    State(state): State<AppState>,
    Path((service, rest)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(state, service, format!("/{rest}"), method, headers, body).await
}

/// `/api/{service}` — the service root with no further path.
pub async fn proxy_bare(
    State(state): State<AppState>,
    Path(service): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(state, service, "/".to_string(), method, headers, body).await
}
