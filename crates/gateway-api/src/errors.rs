//! HTTP-boundary mapping from [`GatewayError`] to the gateway's uniform
//! error envelope.
//!
//! `gateway-types::error::GatewayError` stays free of any HTTP dependency;
//! this is the one place in the workspace that maps its variants onto
//! status codes, error codes, and the JSON body every non-2xx response
//! shares.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use gateway_types::error::GatewayError;

/// Wraps [`GatewayError`] so it can implement [`IntoResponse`] without
/// violating the orphan rule (both the trait and the error type live in
/// other crates).
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(GatewayError::Other(err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

fn status_and_code(err: &GatewayError) -> (StatusCode, &'static str) {
    match err {
        GatewayError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        GatewayError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
        GatewayError::Unauthorized(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        GatewayError::CreateFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SESSION_CREATE_FAILED"),
        GatewayError::IdPExchangeFailed(_) => (StatusCode::BAD_GATEWAY, "IDP_EXCHANGE_FAILED"),
        GatewayError::IdPRefreshFailed(_) => (StatusCode::UNAUTHORIZED, "IDP_REFRESH_FAILED"),
        GatewayError::Cache(_) => (StatusCode::SERVICE_UNAVAILABLE, "CACHE_ERROR"),
        GatewayError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_ERROR"),
        GatewayError::Downstream(_) => (StatusCode::BAD_GATEWAY, "DOWNSTREAM_ERROR"),
        GatewayError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        GatewayError::CircuitOpen(_) => (StatusCode::SERVICE_UNAVAILABLE, "CIRCUIT_OPEN"),
        GatewayError::RateLimitExceeded(_) => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED"),
        GatewayError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
        GatewayError::Json(_) => (StatusCode::BAD_REQUEST, "MALFORMED_JSON"),
        GatewayError::Custom(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        GatewayError::Other(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = status_and_code(&self.0);
        let message = self.0.to_string();
        let trace_id = uuid::Uuid::new_v4().to_string();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                tracing::error!(error_code, trace_id, message = %message, "request failed");
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(error_code, trace_id, message = %message, "request denied");
            }
            _ => {
                tracing::warn!(error_code, trace_id, message = %message, "request rejected");
            }
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "errorCode": error_code,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "traceId": trace_id,
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
