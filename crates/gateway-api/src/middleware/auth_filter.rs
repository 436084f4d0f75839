//! `AuthFilter`: the reactive state machine that turns every inbound
//! request into either a forwarded request with an injected bearer header,
//! or a 401/403/503.
//!
//! Structurally grounded on the public-path allowlist / header-extraction
//! shape of an API-key gate, with the gate condition replaced end to end
//! by the session/refresh/authorize pipeline this gateway actually needs.
//!
//! ```text
//! Start
//!   -> classify route (Public / AuthenticatedOnly / DashboardRole)
//!   -> Public? forward unconditionally, still MetricsCollector.record on completion
//!   -> extract session cookie; missing -> Emit401
//!   -> SessionStore.get_access_token
//!        absent -> Emit401
//!        present, not expired -> continue
//!        present, expired -> refresh via IdPClient, SessionStore.update_tokens
//!                              ok -> continue with new token
//!                              err -> SessionStore.delete; Emit401
//!   -> CSRF check (mutating methods only)
//!   -> authorization check (DashboardRole only)
//!   -> inject Authorization: Bearer, strip client-sent Authorization
//!   -> next.run -> response
//!   -> MetricsCollector.record (fire-and-forget), online marker touch (fire-and-forget)
//! ```

use std::time::{Instant, SystemTime};

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use gateway_types::authz::AuthzPolicy;
use gateway_types::error::GatewayError;
use gateway_types::token::decode_access_token_claims;

use crate::errors::ApiError;
use crate::state::{AppState, AuthContext, RouteKind};

fn is_mutating(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE | Method::PATCH)
}

fn error_response(err: GatewayError) -> Response {
    ApiError(err).into_response()
}

/// `axum::middleware::from_fn_with_state` entry point.
pub async fn auth_filter(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let kind = state.policy.classify(&path);

    if kind == RouteKind::Public {
        let response = next.run(req).await;
        return finish(&state, &method, &path, start, response);
    }

    let jar = CookieJar::from_headers(req.headers());
    let Some(session_id) = jar.get(&state.config.session_cookie_name).map(|c| c.value().to_string()) else {
        return finish(&state, &method, &path, start, error_response(GatewayError::Unauthenticated("missing session cookie".into())));
    };

    let cached = match state.sessions.get_access_token(&session_id).await {
        Ok(Some(cached)) => cached,
        Ok(None) => {
            return finish(
                &state,
                &method,
                &path,
                start,
                error_response(GatewayError::Unauthenticated("no session for cookie".into())),
            )
        }
        Err(e) => return finish(&state, &method, &path, start, error_response(e)),
    };

    let access_token = if cached.access_expires_at <= SystemTime::now() {
        match refresh_session(&state, &session_id).await {
            Ok(token) => token,
            Err(response) => return finish(&state, &method, &path, start, response),
        }
    } else {
        cached.access_token
    };

    let user_id = match decode_access_token_claims(&access_token) {
        Ok(claims) => claims.sub,
        Err(e) => {
            return finish(
                &state,
                &method,
                &path,
                start,
                error_response(GatewayError::Unauthenticated(format!("undecodable access token: {e}"))),
            )
        }
    };

    if is_mutating(&method) {
        if let Err(response) = check_csrf(&state, &jar, &req) {
            return finish(&state, &method, &path, start, response);
        }
    }

    if kind == RouteKind::DashboardRole {
        if let Err(response) = check_dashboard_authorization(&state, &user_id).await {
            return finish(&state, &method, &path, start, response);
        }
    }

    req.headers_mut().remove(header::AUTHORIZATION);
    let bearer = match header::HeaderValue::from_str(&format!("Bearer {access_token}")) {
        Ok(value) => value,
        Err(_) => {
            return finish(
                &state,
                &method,
                &path,
                start,
                error_response(GatewayError::Custom("access token is not a valid header value".into())),
            )
        }
    };
    req.headers_mut().insert(header::AUTHORIZATION, bearer);
    req.extensions_mut().insert(AuthContext {
        session_id: session_id.clone(),
        user_id: user_id.clone(),
        access_token,
    });

    touch_online(&state, &user_id);

    let response = next.run(req).await;
    finish(&state, &method, &path, start, response)
}

/// Fetch the full session, refresh against the IdP, and persist the new
/// tokens. A rejected refresh destroys the session outright — there is no
/// retry, since a rejected refresh token will not become valid later.
async fn refresh_session(state: &AppState, session_id: &str) -> Result<String, Response> {
    let session = match state.sessions.get(session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(error_response(GatewayError::Unauthenticated("session vanished before refresh".into()))),
        Err(e) => return Err(error_response(e)),
    };

    match state.idp.refresh(&session.refresh_token).await {
        Ok(tokens) => {
            if let Err(e) = state
                .sessions
                .update_tokens(session_id, &tokens.access_token, Some(&tokens.refresh_token))
                .await
            {
                return Err(error_response(e));
            }
            Ok(tokens.access_token)
        }
        Err(_) => {
            let _ = state.sessions.delete(session_id).await;
            Err(error_response(GatewayError::Unauthenticated("refresh rejected by identity provider".into())))
        }
    }
}

/// Double-submit CSRF check: the header must echo a non-empty, non-HttpOnly
/// cookie value issued at login. No server-side correlation store is
/// needed because `SESSION_ID` is `SameSite=Strict`, so only same-site
/// script can ever have read the CSRF cookie to echo it back.
fn check_csrf(state: &AppState, jar: &CookieJar, req: &Request) -> Result<(), Response> {
    let cookie_value = jar.get(&state.config.csrf_cookie_name).map(|c| c.value().to_string());
    let header_name = match HeaderName::from_bytes(state.config.csrf_header_name.as_bytes()) {
        Ok(name) => name,
        Err(_) => return Err(error_response(GatewayError::Configuration("invalid csrf header name".into()))),
    };
    let header_value = req.headers().get(&header_name).and_then(|v| v.to_str().ok());

    match (cookie_value.as_deref(), header_value) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && cookie == header => Ok(()),
        _ => Err(error_response(GatewayError::Unauthorized(vec!["csrf-header".to_string()]))),
    }
}

async fn check_dashboard_authorization(state: &AppState, user_id: &str) -> Result<(), Response> {
    let roles = match state.roles.get(user_id).await {
        Ok(roles) => roles,
        Err(e) => return Err(error_response(e)),
    };

    let required = state.allowed_roles.current().as_ref().clone();
    let policy = AuthzPolicy::AnyRoleOf(required);

    policy
        .evaluate(&roles, &Default::default())
        .map_err(|missing| error_response(GatewayError::Unauthorized(missing)))
}

fn touch_online(state: &AppState, user_id: &str) {
    let sessions = state.sessions.clone();
    let user_id = user_id.to_string();
    tokio::spawn(async move {
        if let Err(e) = sessions.touch_online(&user_id).await {
            tracing::debug!("online marker touch failed (swallowed): {e}");
        }
    });
}

/// 403 counts as an error for the dashboard's error-rate definition,
/// alongside any 5xx — a denied request is a failure from the caller's
/// point of view even though the gateway itself behaved correctly.
fn is_error_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::FORBIDDEN
}

/// `/healthz` and `/metrics` are probe/scrape traffic, not user requests —
/// excluded from the RPS/request counters and the gateway's own request tally.
fn is_probe_path(path: &str) -> bool {
    path == "/healthz" || path == "/metrics"
}

fn finish(state: &AppState, method: &Method, path: &str, start: Instant, response: Response) -> Response {
    if is_probe_path(path) {
        return response;
    }

    let elapsed = start.elapsed();
    let is_error = is_error_status(response.status());
    state.metrics_collector.record(method.as_str(), path, elapsed, is_error);
    state.tally.record(is_error);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_counts_as_error_alongside_server_errors() {
        assert!(is_error_status(StatusCode::FORBIDDEN));
        assert!(is_error_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_error_status(StatusCode::OK));
        assert!(!is_error_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn probe_paths_are_excluded_from_metrics() {
        assert!(is_probe_path("/healthz"));
        assert!(is_probe_path("/metrics"));
        assert!(!is_probe_path("/auth/login"));
        assert!(!is_probe_path("/api/v1/dashboard/realtime"));
    }
}
