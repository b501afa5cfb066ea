//! Forced sign-out port

use async_trait::async_trait;

/// Ends the user's session after an unrecoverable refresh failure.
#[async_trait]
pub trait SignOutHandler: Send + Sync {
    /// Signs the user out and sends them to `redirect_to`.
    ///
    /// Implementations log their own failures.
    async fn sign_out(&self, redirect_to: &str);
}
