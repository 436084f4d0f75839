//! OIDC identity provider client.
//!
//! Uses a direct `reqwest::Client` rather than the load-balanced client in
//! `gateway-dispatch`, because the identity provider lives at a single
//! fixed URL and its own reliability posture (timeouts only, no retries on
//! refresh) differs from the downstream-service envelope.

use serde::Deserialize;
use std::time::Duration;

use gateway_types::error::{GatewayError, Result as GatewayResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Tokens and expiry returned by a successful code exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Duration,
}

#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

/// Identity provider client speaking the OAuth2/OIDC token endpoint.
pub struct OidcIdPClient {
    http: reqwest::Client,
    token_endpoint: String,
    revocation_endpoint: Option<String>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OidcIdPClient {
    pub fn new(
        token_endpoint: impl Into<String>,
        revocation_endpoint: Option<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Configuration(format!("failed to build IdP http client: {e}")))?;

        Ok(Self {
            http,
            token_endpoint: token_endpoint.into(),
            revocation_endpoint,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
        })
    }

    /// Exchange an authorization code (plus PKCE verifier) for tokens.
    pub async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> GatewayResult<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code_verifier", pkce_verifier),
        ];

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::IdPExchangeFailed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::IdPExchangeFailed(format!(
                "non-2xx status {status}: {body}"
            )));
        }

        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::IdPExchangeFailed(format!("invalid response body: {e}")))?;

        Ok(TokenResponse {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token.unwrap_or_default(),
            expires_in: Duration::from_secs(raw.expires_in),
        })
    }

    /// Refresh a session's tokens. No retries: failure here must surface so
    /// the caller tears down the session rather than silently retrying
    /// against a refresh token that may already be rotated.
    pub async fn refresh(&self, refresh_token: &str) -> GatewayResult<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::IdPRefreshFailed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::IdPRefreshFailed(format!(
                "non-2xx status {status}: {body}"
            )));
        }

        let raw: RawTokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::IdPRefreshFailed(format!("invalid response body: {e}")))?;

        Ok(TokenResponse {
            access_token: raw.access_token,
            // Some IdPs rotate the refresh token on every refresh, some
            // don't; fall back to the one we already had.
            refresh_token: raw.refresh_token.unwrap_or_else(|| refresh_token.to_string()),
            expires_in: Duration::from_secs(raw.expires_in),
        })
    }

    /// Best-effort revocation on logout. Failure is logged and swallowed —
    /// the session is already being torn down locally regardless.
    pub async fn revoke(&self, refresh_token: &str) {
        let Some(endpoint) = &self.revocation_endpoint else {
            return;
        };

        let form = [
            ("token", refresh_token),
            ("token_type_hint", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        if let Err(e) = self.http.post(endpoint).form(&form).send().await {
            tracing::warn!("token revocation failed (swallowed): {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> OidcIdPClient {
        OidcIdPClient::new(
            format!("{}/token", server.uri()),
            Some(format!("{}/revoke", server.uri())),
            "client-1",
            "secret",
            "https://gateway.example.com/auth/callback",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn exchange_code_parses_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "AT1",
                "refresh_token": "RT1",
                "expires_in": 300
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let tokens = client.exchange_code("AC", "verifier").await.unwrap();
        assert_eq!(tokens.access_token, "AT1");
        assert_eq!(tokens.refresh_token, "RT1");
        assert_eq!(tokens.expires_in, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn exchange_code_fails_on_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.exchange_code("bad-code", "verifier").await.unwrap_err();
        assert!(matches!(err, GatewayError::IdPExchangeFailed(_)));
    }

    #[tokio::test]
    async fn refresh_keeps_old_token_when_idp_does_not_rotate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "AT2",
                "expires_in": 300
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let tokens = client.refresh("RT1").await.unwrap();
        assert_eq!(tokens.access_token, "AT2");
        assert_eq!(tokens.refresh_token, "RT1");
    }

    #[tokio::test]
    async fn refresh_surfaces_failure_as_idp_refresh_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.refresh("stale").await.unwrap_err();
        assert!(matches!(err, GatewayError::IdPRefreshFailed(_)));
    }

    #[tokio::test]
    async fn revoke_swallows_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.revoke("RT1").await;
    }
}
