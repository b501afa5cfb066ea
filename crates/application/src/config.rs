//! Client configuration

use std::time::Duration;

use tally_domain::NoAuthPaths;

/// Default age after which the cached session is re-read from the store.
pub const DEFAULT_SESSION_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default sign-in surface the user is sent to after a forced sign-out.
pub const DEFAULT_SIGNIN_PATH: &str = "/auth/signin";

/// Behavioural settings of [`crate::ApiClient`].
///
/// Transport concerns (base URL, timeouts) belong to the transport adapter.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Paths that never receive an `Authorization` header.
    pub no_auth_paths: NoAuthPaths,
    /// How long a fetched session is reused before asking the store again.
    pub session_cache_ttl: Duration,
    /// Redirect target passed to the sign-out handler.
    pub signin_path: String,
    /// Capacity of the auth event broadcast channel.
    pub event_capacity: usize,
}

impl ClientConfig {
    /// Replaces the no-auth allowlist.
    #[must_use]
    pub fn with_no_auth_paths(mut self, paths: NoAuthPaths) -> Self {
        self.no_auth_paths = paths;
        self
    }

    /// Sets the session cache TTL.
    #[must_use]
    pub const fn with_session_cache_ttl(mut self, ttl: Duration) -> Self {
        self.session_cache_ttl = ttl;
        self
    }

    /// Sets the sign-in redirect target.
    #[must_use]
    pub fn with_signin_path(mut self, path: impl Into<String>) -> Self {
        self.signin_path = path.into();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            no_auth_paths: NoAuthPaths::default(),
            session_cache_ttl: DEFAULT_SESSION_CACHE_TTL,
            signin_path: DEFAULT_SIGNIN_PATH.to_string(),
            event_capacity: 32,
        }
    }
}
