//! HTTP session store adapter.
//!
//! The signed-in session is owned by the web shell's session service. This
//! adapter reads it, writes refreshed tokens back through the update
//! side-channel, and ends it on sign-out.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tally_application::ports::SessionProvider;
use tally_domain::{AuthError, Session};
use tracing::{debug, instrument};

const SESSION_PATH: &str = "/api/auth/session";
const UPDATE_SESSION_PATH: &str = "/api/auth/update-session";
const SIGNOUT_PATH: &str = "/api/auth/signout";

/// `SessionProvider` backed by the session service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSessionStore {
    http_client: reqwest::Client,
    session_url: Url,
    timeout: Option<Duration>,
}

impl HttpSessionStore {
    /// Creates a store talking to the session service at `session_url`.
    #[must_use]
    pub fn new(session_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), session_url)
    }

    /// Creates a store with a custom reqwest client.
    #[must_use]
    pub const fn with_client(http_client: reqwest::Client, session_url: Url) -> Self {
        Self {
            http_client,
            session_url,
            timeout: None,
        }
    }

    /// Sets the timeout for session service calls. `None` waits
    /// indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn timed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        let raw = format!("{}{path}", self.session_url.as_str().trim_end_matches('/'));
        Url::parse(&raw).map_err(|e| unavailable(format!("invalid session URL {raw}: {e}")))
    }

    async fn post(&self, path: &str, body: Option<&Session>) -> Result<(), AuthError> {
        let mut builder = self.http_client.post(self.endpoint(path)?);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = self
            .timed(builder)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(unavailable(format!("{path} returned {}", response.status())))
        }
    }
}

fn unavailable(message: String) -> AuthError {
    AuthError::SessionUnavailable { message }
}

/// An empty object, `null`, or a body without `accessToken` means signed out.
fn parse_session(body: serde_json::Value) -> Result<Option<Session>, AuthError> {
    let signed_in = body
        .get("accessToken")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|token| !token.is_empty());
    if !signed_in {
        return Ok(None);
    }

    serde_json::from_value(body)
        .map(Some)
        .map_err(|e| unavailable(format!("malformed session: {e}")))
}

#[async_trait]
impl SessionProvider for HttpSessionStore {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Option<Session>, AuthError> {
        let response = self
            .timed(self.http_client.get(self.endpoint(SESSION_PATH)?))
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("{SESSION_PATH} returned {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if bytes.is_empty() {
            debug!("Session service returned an empty body");
            return Ok(None);
        }

        let body: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("malformed session: {e}")))?;
        parse_session(body)
    }

    #[instrument(skip_all)]
    async fn update(&self, session: &Session) -> Result<(), AuthError> {
        self.post(UPDATE_SESSION_PATH, Some(session)).await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), AuthError> {
        self.post(SIGNOUT_PATH, None).await
    }
}
