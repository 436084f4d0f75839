//! Error types shared across the gateway crates.

use thiserror::Error;

/// Result type alias using [`GatewayError`].
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type for gateway operations.
///
/// Variants map onto the error taxonomy used at the HTTP boundary
/// (input / unauthenticated / unauthorized / store-transient / idp /
/// downstream / programmer); the mapping to status codes lives in
/// `gateway-api::errors` so this crate stays free of any HTTP dependency.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed cookie, missing header, bad `state` parameter.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No session, expired session, or refresh failed.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Authenticated but required role/permission absent.
    #[error("unauthorized, missing: {0:?}")]
    Unauthorized(Vec<String>),

    /// Session creation failed (token decode or store write).
    #[error("session creation failed: {0}")]
    CreateFailed(String),

    /// Token exchange with the identity provider failed.
    #[error("identity provider exchange failed: {0}")]
    IdPExchangeFailed(String),

    /// Token refresh with the identity provider failed.
    #[error("identity provider refresh failed: {0}")]
    IdPRefreshFailed(String),

    /// Cache/store operation failed.
    #[error("cache operation failed: {0}")]
    Cache(String),

    /// Shared-store operation failed (Redis or equivalent).
    #[error("store operation failed: {0}")]
    Store(String),

    /// Downstream service call failed after circuit breaker / retry.
    #[error("downstream call failed: {0}")]
    Downstream(String),

    /// No healthy endpoints for a service.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Circuit is open, request rejected without attempt.
    #[error("circuit open for: {0}")]
    CircuitOpen(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with custom message, used sparingly.
    #[error("{0}")]
    Custom(String),

    /// Error from anyhow for interoperability with adapter crates.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// Build a [`GatewayError::Custom`] from anything string-like.
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        GatewayError::Custom(msg.into())
    }

    /// True for the "store transient" bucket: worth a single jittered retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Store(_) | GatewayError::Downstream(_))
    }

    /// True when the session should be torn down rather than retried.
    pub fn destroys_session(&self) -> bool {
        matches!(
            self,
            GatewayError::IdPRefreshFailed(_) | GatewayError::Unauthenticated(_)
        )
    }
}
