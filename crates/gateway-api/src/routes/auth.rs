//! `/auth/*`: the OIDC authorization-code + PKCE dance, logout, and the two
//! session-introspection endpoints the frontend polls.

use std::time::SystemTime;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;

use gateway_idp::{build_authorize_url, PkceChallenge};
use gateway_types::error::GatewayError;
use gateway_types::token::decode_access_token_claims;

use crate::errors::{ApiError, ApiResult};
use crate::middleware::cookies::{build_cookie, expired_cookie};
use crate::state::{AppState, AuthContext};

const OIDC_SCOPE: &str = "openid profile email";

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// Where to send the browser once the callback completes. Defaults to
    /// the app root; never trusted further than "opaque path to redirect
    /// to" — it is never interpreted as a URL to fetch.
    #[serde(rename = "redirectUri")]
    redirect_uri: Option<String>,
}

/// `GET /auth/login` — mint a PKCE challenge, stash it behind its `state`
/// value, and bounce the browser to the identity provider.
pub async fn login(State(state): State<AppState>, Query(params): Query<LoginParams>) -> ApiResult<Response> {
    let challenge = PkceChallenge::generate();
    let redirect_uri = params.redirect_uri.unwrap_or_else(|| "/".to_string());

    state
        .oauth_state
        .put(&challenge.state, &challenge.code_verifier, &redirect_uri)
        .await?;

    let authorize_url = build_authorize_url(
        &state.config.idp.authorize_uri,
        &state.config.idp.client_id,
        &state.config.idp.redirect_uri,
        OIDC_SCOPE,
        &challenge,
    )?;

    Ok(Redirect::to(authorize_url.as_str()).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: String,
    state: String,
}

/// `GET /auth/callback` — exchange the code, create the session, set the
/// session and CSRF cookies, and send the browser back where it started.
pub async fn callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> ApiResult<Response> {
    let Some((code_verifier, redirect_uri)) = state.oauth_state.take(&params.state).await? else {
        return Err(GatewayError::InvalidRequest("unknown or expired oauth state".to_string()).into());
    };

    let tokens = state.idp.exchange_code(&params.code, &code_verifier).await?;
    let session_id = state.sessions.create(&tokens.access_token, &tokens.refresh_token).await?;

    let session_cookie = build_cookie(
        state.config.session_cookie_name.clone(),
        session_id,
        state.config.session.ttl,
        true,
    );
    let csrf_cookie = build_cookie(
        state.config.csrf_cookie_name.clone(),
        random_csrf_token(),
        state.config.session.ttl,
        false,
    );

    let jar = CookieJar::new().add(session_cookie).add(csrf_cookie);
    Ok((jar, Redirect::to(&redirect_uri)).into_response())
}

fn random_csrf_token() -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `POST /auth/logout` — tear down the session, clear both cookies, and
/// best-effort revoke the refresh token at the identity provider.
pub async fn logout(State(state): State<AppState>, Extension(ctx): Extension<AuthContext>) -> ApiResult<Response> {
    if let Ok(Some(session)) = state.sessions.get(&ctx.session_id).await {
        state.idp.revoke(&session.refresh_token).await;
    }
    state.sessions.delete(&ctx.session_id).await?;

    let jar = CookieJar::new()
        .add(expired_cookie(state.config.session_cookie_name.clone()))
        .add(expired_cookie(state.config.csrf_cookie_name.clone()));

    Ok((jar, Json(json!({ "status": "ok" }))).into_response())
}

#[derive(Debug, Serialize)]
struct MeResponse {
    sub: String,
    #[serde(rename = "name")]
    username: String,
    email: String,
    roles: Vec<String>,
    authenticated: bool,
}

/// `GET /auth/me` — the authenticated principal's identity and roles, read
/// from the session `AuthFilter` already validated for this request.
pub async fn me(State(state): State<AppState>, Extension(ctx): Extension<AuthContext>) -> ApiResult<Json<serde_json::Value>> {
    let claims = decode_access_token_claims(&ctx.access_token)?;
    let roles = state.roles.get(&ctx.user_id).await?;

    let body = MeResponse {
        sub: claims.sub.clone(),
        username: claims.username(),
        email: claims.email(),
        roles: roles.into_iter().collect(),
        authenticated: true,
    };
    Ok(Json(serde_json::to_value(body).map_err(GatewayError::from)?))
}

/// `GET /auth/status` — lightweight session liveness check for the
/// frontend's polling heartbeat, including the current CSRF token so a
/// page freshly loaded over SSR can pick it up without reading cookies.
pub async fn status(State(state): State<AppState>, Extension(ctx): Extension<AuthContext>, jar: CookieJar) -> ApiResult<Json<serde_json::Value>> {
    let session = state
        .sessions
        .get(&ctx.session_id)
        .await?
        .ok_or_else(|| GatewayError::Unauthenticated("session vanished".to_string()))?;

    let expires_in = session
        .access_expires_at
        .duration_since(SystemTime::now())
        .unwrap_or_default()
        .as_secs();

    let csrf = jar.get(&state.config.csrf_cookie_name).map(|c| c.value().to_string()).unwrap_or_default();

    Ok(Json(json!({
        "authenticated": true,
        "sessionId": ctx.session_id,
        "expiresIn": expires_in,
        "csrf": csrf,
    })))
}
