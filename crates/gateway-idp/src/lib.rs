//! OIDC identity provider client.
//!
//! Code exchange, silent refresh, and best-effort revocation against the
//! gateway's upstream identity provider. Deliberately bypasses the
//! load-balanced downstream dispatcher in `gateway-dispatch`: the IdP lives
//! at one fixed, trusted URL, so there is no endpoint to discover or retry
//! across.

pub mod client;
pub mod pkce;

pub use client::{OidcIdPClient, TokenResponse};
pub use pkce::{build_authorize_url, PkceChallenge};
