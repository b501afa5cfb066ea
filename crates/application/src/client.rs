//! Authenticated API client.
//!
//! Every request picks up the cached session's access token. A 401 triggers
//! at most one token refresh no matter how many requests fail at once;
//! requests that fail while the refresh runs wait for it and are replayed
//! with the new token.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tally_domain::{ApiRequest, ApiResponse, AuthError, QueryParam, Session};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::auth::{
    AuthEvent, RefreshCoordinator, RefreshLease, RefreshState, RefreshTicket, SessionCache,
    TokenStatus,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::ports::{Clock, HttpTransport, SessionProvider, SignOutHandler, TokenRefresher};

/// Bearer-token HTTP client with single-flight refresh.
///
/// Construct once and share behind an `Arc`; all refresh state lives in the
/// instance.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    sessions: SessionCache,
    refresher: Arc<dyn TokenRefresher>,
    sign_out: Arc<dyn SignOutHandler>,
    clock: Arc<dyn Clock>,
    coordinator: RefreshCoordinator,
    config: ClientConfig,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    /// Creates a client from its collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        sessions: Arc<dyn SessionProvider>,
        refresher: Arc<dyn TokenRefresher>,
        sign_out: Arc<dyn SignOutHandler>,
        clock: Arc<dyn Clock>,
        config: ClientConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            transport,
            sessions: SessionCache::new(sessions, config.session_cache_ttl),
            refresher,
            sign_out,
            clock,
            coordinator: RefreshCoordinator::new(),
            config,
            events,
        }
    }

    /// Sends `request`, recovering once from an expired access token.
    ///
    /// # Errors
    /// - `ClientError::Status` for any non-2xx response, including a second
    ///   401 after the replay
    /// - `ClientError::Auth` when the session could not be refreshed
    /// - `ClientError::Transport` when no response was received
    /// - `ClientError::Domain` when the request is malformed
    #[instrument(
        skip(self, request),
        fields(id = %request.id, method = %request.method, path = %request.path)
    )]
    pub async fn request(&self, mut request: ApiRequest) -> ClientResult<ApiResponse> {
        request.validate()?;

        let exempt = self.config.no_auth_paths.exempts(&request);
        if exempt {
            if request.clear_authorization() {
                debug!("Removed Authorization header from no-auth request");
            }
        } else if let Some(session) = self.sessions.current().await? {
            request.set_bearer(&session.access_token);
        } else {
            debug!("No session, sending without credentials");
        }

        let response = self.transport.execute(&request).await?;
        if exempt || request.retried || !response.status.is_unauthorized() {
            return Self::settle(response);
        }

        request.retried = true;
        let session = self.recover().await?;
        request.set_bearer(&session.access_token);

        debug!("Replaying request with refreshed token");
        let response = self.transport.execute(&request).await?;
        Self::settle(response)
    }

    /// Sends a GET request.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> ClientResult<ApiResponse> {
        self.request(ApiRequest::get(path)).await
    }

    /// Sends a GET request with query parameters.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn get_with_query<I, K, V>(&self, path: &str, query: I) -> ClientResult<ApiResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut request = ApiRequest::get(path);
        for (key, value) in query {
            request.query.add(QueryParam::new(key, value));
        }
        self.request(request).await
    }

    /// Sends a POST request with an optional JSON body.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn post(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<ApiResponse> {
        self.request(with_body(ApiRequest::post(path), body)).await
    }

    /// Sends a PUT request with an optional JSON body.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn put(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<ApiResponse> {
        self.request(with_body(ApiRequest::put(path), body)).await
    }

    /// Sends a PATCH request with an optional JSON body.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn patch(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<ApiResponse> {
        self.request(with_body(ApiRequest::patch(path), body)).await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    /// See [`ApiClient::request`].
    pub async fn delete(&self, path: &str) -> ClientResult<ApiResponse> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Sends a GET request and decodes the JSON body.
    ///
    /// # Errors
    /// `ClientError::Decode` if the body is not a `T`, otherwise see
    /// [`ApiClient::request`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.get(path).await?;
        decode(&response)
    }

    /// Sends a POST request with a serialized body and decodes the JSON reply.
    ///
    /// # Errors
    /// `ClientError::Encode` or `ClientError::Decode` on body conversion
    /// failures, otherwise see [`ApiClient::request`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Encode(e.to_string()))?;
        let response = self.post(path, Some(body)).await?;
        decode(&response)
    }

    /// Subscribes to auth events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Current state of the refresh state machine.
    #[must_use]
    pub fn refresh_state(&self) -> RefreshState {
        self.coordinator.state()
    }

    /// Number of requests waiting on the in-flight refresh.
    #[must_use]
    pub fn pending_refreshes(&self) -> usize {
        self.coordinator.pending()
    }

    /// Expiry status of the current session.
    ///
    /// # Errors
    /// Returns `ClientError::Auth` if the session store cannot be read.
    pub async fn session_status(&self) -> ClientResult<TokenStatus> {
        let session = self.sessions.current().await?;
        Ok(TokenStatus::of(session.as_ref(), self.clock.now()))
    }

    /// The client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn recover(&self) -> Result<Session, AuthError> {
        match self.coordinator.acquire() {
            RefreshTicket::Follower(waiter) => {
                debug!("Refresh in flight, waiting");
                waiter.wait().await
            }
            RefreshTicket::Leader(lease) => self.lead_refresh(lease).await,
        }
    }

    #[instrument(skip_all)]
    async fn lead_refresh(&self, lease: RefreshLease<'_>) -> Result<Session, AuthError> {
        self.emit(AuthEvent::RefreshStarted);

        match self.refresh_session().await {
            Ok(session) => {
                self.sessions.replace(session.clone());
                let released = lease.complete(&Ok(session.clone()));
                let token_preview = AuthEvent::token_preview(&session.access_token);
                info!(token = %token_preview, released, "Access token refreshed");

                if let Err(e) = self.sessions.provider().update(&session).await {
                    warn!(error = %e, "Failed to write refreshed session back to the store");
                }

                self.emit(AuthEvent::TokenRefreshed {
                    token_preview,
                    expires_at: session.access_token_expires,
                    released,
                });
                Ok(session)
            }
            Err(error) => {
                // 401s arriving during sign-out join this failed batch.
                self.sessions.clear();
                self.sign_out.sign_out(&self.config.signin_path).await;
                let rejected = lease.complete(&Err(error.clone()));
                warn!(%error, rejected, "Token refresh failed, signed out");

                self.emit(AuthEvent::RefreshFailed {
                    error: error.clone(),
                    rejected,
                });
                self.emit(AuthEvent::SignedOut {
                    redirect_to: self.config.signin_path.clone(),
                });
                Err(error)
            }
        }
    }

    async fn refresh_session(&self) -> Result<Session, AuthError> {
        let current = self
            .sessions
            .current()
            .await?
            .ok_or(AuthError::NoRefreshToken)?;
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(AuthError::NoRefreshToken)?;

        let grant = self.refresher.refresh(refresh_token).await?;
        Ok(current.refreshed(grant, self.clock.now()))
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn settle(response: ApiResponse) -> ClientResult<ApiResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::status(response))
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("sessions", &self.sessions)
            .field("coordinator", &self.coordinator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn with_body(request: ApiRequest, body: Option<serde_json::Value>) -> ApiRequest {
    match body {
        Some(body) => request.with_body(body),
        None => request,
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> ClientResult<T> {
    response
        .json_body()
        .map_err(|e| ClientError::Decode(e.to_string()))
}
