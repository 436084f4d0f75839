//! `GET /healthz` — liveness/readiness probe for the gateway itself,
//! distinct from the downstream service health the dashboard reports.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let redis_ok = match state.pool.get().await {
        Ok(mut conn) => redis::cmd("PING").query_async::<String>(&mut *conn).await.is_ok(),
        Err(_) => false,
    };

    let status = if redis_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = json!({
        "status": if redis_ok { "up" } else { "down" },
        "redis": redis_ok,
    });

    (status, Json(body))
}
