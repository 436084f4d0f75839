//! Session domain model.
//!
//! A [`Session`] is the authoritative record behind an opaque
//! [`SessionCookie`]; it is created on OIDC code exchange and mutated only
//! by refresh and last-accessed bumping.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Authenticated user session.
///
/// Invariants: `access_expires_at >= created_at`; a session with both
/// tokens expired is removed on next access rather than returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// 128-bit opaque session identifier, uniformly random.
    pub id: String,
    /// Identity provider subject (`sub` claim).
    pub user_id: String,
    /// Display username, decoded from the access token at creation.
    pub username: String,
    /// Email, decoded from the access token at creation.
    pub email: String,
    /// Current opaque access token.
    pub access_token: String,
    /// Current opaque refresh token.
    pub refresh_token: String,
    /// Absolute instant the access token expires.
    pub access_expires_at: SystemTime,
    /// Absolute instant the refresh token expires.
    pub refresh_expires_at: SystemTime,
    /// Session creation timestamp.
    pub created_at: SystemTime,
    /// Last-accessed timestamp, bumped at most once per N seconds.
    pub last_accessed_at: SystemTime,
}

impl Session {
    /// True once the access token has expired and a refresh is required.
    pub fn access_token_expired(&self) -> bool {
        self.access_expires_at < SystemTime::now()
    }

    /// True once the refresh token itself has expired; the session is dead.
    pub fn refresh_token_expired(&self) -> bool {
        self.refresh_expires_at < SystemTime::now()
    }

    /// Remaining access-token TTL, zero if already expired.
    pub fn access_ttl(&self) -> Duration {
        self.access_expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether `last_accessed_at` should be bumped given a minimum interval.
    pub fn needs_access_bump(&self, min_interval: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.last_accessed_at)
            .map(|elapsed| elapsed >= min_interval)
            .unwrap_or(true)
    }
}

/// Hot-path projection of a [`Session`] kept in L1: just enough to inject
/// the `Authorization` header without touching the shared store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAccessToken {
    pub access_token: String,
    pub access_expires_at: SystemTime,
}

impl From<&Session> for CachedAccessToken {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            access_expires_at: session.access_expires_at,
        }
    }
}

/// Outward-facing cookie attributes. The cookie value is the session id
/// verbatim; it is never readable by client script.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub session_id: String,
    pub max_age: Duration,
    pub http_only: bool,
    pub secure: bool,
    pub same_site_strict: bool,
    pub path: String,
}

impl SessionCookie {
    /// Build a cookie for a freshly created session, matching the
    /// session's configured TTL.
    pub fn for_session(name: impl Into<String>, session_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            session_id: session_id.into(),
            max_age: ttl,
            http_only: true,
            secure: true,
            same_site_strict: true,
            path: "/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session(access_ttl: Duration, refresh_ttl: Duration) -> Session {
        let now = SystemTime::now();
        Session {
            id: "s1".to_string(),
            user_id: "user-1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            access_token: "AT1".to_string(),
            refresh_token: "RT1".to_string(),
            access_expires_at: now + access_ttl,
            refresh_expires_at: now + refresh_ttl,
            created_at: now,
            last_accessed_at: now,
        }
    }

    #[test]
    fn access_token_expiry_detection() {
        let expired = sample_session(Duration::ZERO, Duration::from_secs(3600));
        std::thread::sleep(Duration::from_millis(5));
        assert!(expired.access_token_expired());

        let fresh = sample_session(Duration::from_secs(300), Duration::from_secs(3600));
        assert!(!fresh.access_token_expired());
    }

    #[test]
    fn needs_access_bump_respects_interval() {
        let mut session = sample_session(Duration::from_secs(300), Duration::from_secs(3600));
        assert!(!session.needs_access_bump(Duration::from_secs(60)));

        session.last_accessed_at = SystemTime::now() - Duration::from_secs(120);
        assert!(session.needs_access_bump(Duration::from_secs(60)));
    }

    #[test]
    fn cached_access_token_projects_only_hot_fields() {
        let session = sample_session(Duration::from_secs(300), Duration::from_secs(3600));
        let cached = CachedAccessToken::from(&session);
        assert_eq!(cached.access_token, session.access_token);
        assert_eq!(cached.access_expires_at, session.access_expires_at);
    }
}
