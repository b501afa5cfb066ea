//! Session store port

use async_trait::async_trait;
use tally_domain::{AuthError, Session};

/// The external store that owns the authoritative session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Reads the current session.
    ///
    /// # Returns
    /// `None` when the user is not signed in.
    ///
    /// # Errors
    /// Returns `AuthError::SessionUnavailable` if the store cannot be read.
    async fn fetch(&self) -> Result<Option<Session>, AuthError>;

    /// Persists a refreshed token pair back into the store.
    ///
    /// # Errors
    /// Returns `AuthError::SessionUnavailable` if the store rejects the update.
    async fn update(&self, session: &Session) -> Result<(), AuthError>;

    /// Discards the session (sign-out).
    ///
    /// # Errors
    /// Returns `AuthError::SessionUnavailable` if the store cannot be cleared.
    async fn clear(&self) -> Result<(), AuthError>;
}
