//! Best-effort decoding of the claims carried by an opaque access token.
//!
//! The gateway receives tokens directly from the identity provider over a
//! trusted TLS connection and never re-issues them, so it decodes the JWT
//! payload without re-verifying the signature — verification is the IdP's
//! job at mint time and the resource servers' job at use time.

use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, SystemTime};

use crate::error::{GatewayError, Result};

/// The subset of standard/Keycloak-style claims the gateway needs to
/// populate a new [`crate::session::Session`].
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn username(&self) -> String {
        self.preferred_username.clone().unwrap_or_else(|| self.sub.clone())
    }

    pub fn email(&self) -> String {
        self.email.clone().unwrap_or_default()
    }

    pub fn expires_at(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(self.exp.max(0) as u64)
    }
}

/// Decode the claims from a compact JWT (`header.payload.signature`)
/// without checking the signature.
pub fn decode_access_token_claims(token: &str) -> Result<AccessTokenClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| GatewayError::CreateFailed("access token is not a JWT".to_string()))?;

    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| GatewayError::CreateFailed(format!("invalid token payload encoding: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::CreateFailed(format!("invalid token claims: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_segment(json: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    #[test]
    fn decodes_claims_from_well_formed_jwt() {
        let header = encode_segment(r#"{"alg":"RS256"}"#);
        let payload = encode_segment(
            r#"{"sub":"user-1","preferred_username":"alice","email":"alice@example.com","exp":9999999999}"#,
        );
        let token = format!("{header}.{payload}.signature");

        let claims = decode_access_token_claims(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username(), "alice");
        assert_eq!(claims.email(), "alice@example.com");
    }

    #[test]
    fn falls_back_to_sub_when_username_absent() {
        let header = encode_segment(r#"{"alg":"RS256"}"#);
        let payload = encode_segment(r#"{"sub":"user-2","exp":1}"#);
        let token = format!("{header}.{payload}.signature");

        let claims = decode_access_token_claims(&token).unwrap();
        assert_eq!(claims.username(), "user-2");
        assert_eq!(claims.email(), "");
    }

    #[test]
    fn rejects_non_jwt_input() {
        assert!(decode_access_token_claims("not-a-jwt").is_err());
    }
}
