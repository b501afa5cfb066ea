//! Refresh state and auth events.

use chrono::{DateTime, Utc};
use tally_domain::AuthError;

/// State of the token refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    /// No refresh has run yet, or the last one succeeded.
    #[default]
    Idle,
    /// A refresh call is in flight; new 401s queue behind it.
    Refreshing,
    /// The last refresh failed and the session was signed out.
    /// Gates like `Idle`: a new refresh may start.
    Failed,
}

impl RefreshState {
    /// Check if a refresh is in progress.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Refreshing)
    }
}

/// Events emitted by the client for UI updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A 401 started a token refresh.
    RefreshStarted,
    /// Token refreshed.
    TokenRefreshed {
        /// Preview of the new token.
        token_preview: String,
        /// Advisory expiry of the new token.
        expires_at: Option<DateTime<Utc>>,
        /// Number of queued requests released by this refresh.
        released: usize,
    },
    /// Refresh failed; every queued request was rejected.
    RefreshFailed {
        /// The failure delivered to every waiter.
        error: AuthError,
        /// Number of queued requests rejected.
        rejected: usize,
    },
    /// The user was signed out.
    SignedOut {
        /// Where the shell should navigate.
        redirect_to: String,
    },
}

impl AuthEvent {
    /// Get a preview of an access token (first 8 chars + ...).
    #[must_use]
    pub fn token_preview(token: &str) -> String {
        if token.chars().count() > 12 {
            let head: String = token.chars().take(8).collect();
            format!("{head}...")
        } else {
            token.to_string()
        }
    }
}
