//! Refresh endpoint client.
//!
//! Exchanges the refresh token for a new access token via
//! `POST {base_url}/api/token/refresh/`. The call carries no credentials of
//! its own and does not go through `ApiClient`, so a 401 here can never
//! re-enter the refresh protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tally_application::ports::TokenRefresher;
use tally_domain::{AuthError, TokenGrant, TokenRefreshRequest};
use tracing::{debug, instrument};

/// Path of the refresh endpoint relative to the API base URL.
pub const TOKEN_REFRESH_PATH: &str = "/api/token/refresh/";

/// Error body returned by the backend when a token is rejected.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// `TokenRefresher` that calls the backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http_client: reqwest::Client,
    refresh_url: Url,
    timeout: Option<Duration>,
}

impl HttpTokenRefresher {
    /// Creates a refresher for the backend at `base_url`.
    ///
    /// # Errors
    /// Returns `AuthError::Network` if the HTTP client or the endpoint URL
    /// cannot be built.
    pub fn new(base_url: &Url) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Self::with_client(http_client, base_url)
    }

    /// Creates a refresher with a custom reqwest client.
    ///
    /// # Errors
    /// Returns `AuthError::Network` if the endpoint URL cannot be built.
    pub fn with_client(http_client: reqwest::Client, base_url: &Url) -> Result<Self, AuthError> {
        let raw = format!(
            "{}{TOKEN_REFRESH_PATH}",
            base_url.as_str().trim_end_matches('/')
        );
        let refresh_url = Url::parse(&raw).map_err(|e| AuthError::Network {
            message: format!("invalid refresh URL {raw}: {e}"),
        })?;
        Ok(Self {
            http_client,
            refresh_url,
            timeout: None,
        })
    }

    /// Sets the refresh call timeout. `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint this refresher posts to.
    #[must_use]
    pub const fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }

    fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<TokenErrorResponse>(body) {
            Ok(TokenErrorResponse {
                detail: Some(detail),
                code,
            }) => match code {
                Some(code) => format!("{status}: {detail} ({code})"),
                None => format!("{status}: {detail}"),
            },
            _ if body.is_empty() => status.to_string(),
            _ => format!("{status}: {body}"),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip_all, fields(url = %self.refresh_url))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let body = TokenRefreshRequest {
            refresh: refresh_token.to_string(),
        };

        let mut builder = self.http_client.post(self.refresh_url.clone()).json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AuthError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            debug!(%status, "Refresh token rejected");
            return Err(AuthError::RefreshFailed {
                message: Self::rejection_message(status, &error_text),
            });
        }

        response
            .json::<TokenGrant>()
            .await
            .map_err(|e| AuthError::RefreshFailed {
                message: format!("Failed to parse token response: {e}"),
            })
    }
}
