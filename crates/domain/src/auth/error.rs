//! Authentication errors

use thiserror::Error;

/// Authentication errors.
///
/// `Clone` because a single refresh failure is delivered to every request
/// that was waiting on that refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The cached session has no refresh token.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The refresh endpoint rejected the refresh token.
    #[error("token refresh failed: {message}")]
    RefreshFailed {
        /// Error description.
        message: String,
    },

    /// The refresh was abandoned before it settled (task cancelled or panicked).
    #[error("token refresh aborted before completion")]
    RefreshAborted,

    /// The session store could not be read or written.
    #[error("session unavailable: {message}")]
    SessionUnavailable {
        /// Error description.
        message: String,
    },

    /// Network error while talking to an auth endpoint.
    #[error("network error: {message}")]
    Network {
        /// Error description.
        message: String,
    },
}
