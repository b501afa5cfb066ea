//! Application error types

use thiserror::Error;
use tally_domain::{ApiResponse, AuthError, DomainError, StatusCode};

use crate::ports::TransportError;

/// Errors returned by [`crate::ApiClient`] to its callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session recovery failed; the session is no longer usable.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The backend answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// The full response, for callers that inspect error bodies.
        response: Box<ApiResponse>,
    },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(String),

    /// The response body did not match the expected type.
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// Wraps a non-2xx response.
    #[must_use]
    pub fn status(response: ApiResponse) -> Self {
        Self::Status {
            status: response.status,
            response: Box::new(response),
        }
    }

    /// Returns the HTTP status if the error carries a response.
    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the backend rejected the credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status_code().is_some_and(StatusCode::is_unauthorized)
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
