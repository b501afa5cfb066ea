//! Token refresh endpoint port

use async_trait::async_trait;
use tally_domain::{AuthError, TokenGrant};

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Calls the refresh endpoint.
    ///
    /// # Errors
    /// `AuthError::RefreshFailed` when the backend rejects the token,
    /// `AuthError::Network` when the endpoint cannot be reached.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}
