//! `/api/v1/dashboard/*`: read-only operational views backed by
//! [`gateway_metrics::MetricsAggregator`]. Every handler wraps its DTO in
//! the gateway's uniform `{status, message, data}` envelope.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ApiResult;
use crate::state::AppState;

fn envelope<T: Serialize>(data: T) -> Value {
    serde_json::json!({
        "status": "ok",
        "message": "",
        "data": data,
    })
}

pub async fn realtime(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.realtime().await?)))
}

pub async fn services(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.services().await?)))
}

pub async fn traffic(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.traffic().await?)))
}

pub async fn latency(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.latency().await?)))
}

pub async fn database(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.database().await?)))
}

pub async fn redis_info(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.redis_info().await?)))
}

pub async fn slow_endpoints(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(envelope(state.aggregator.slow_endpoints().await?)))
}
