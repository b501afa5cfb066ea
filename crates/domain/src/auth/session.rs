//! Session and token refresh types

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime assumed for an access token when the refresh endpoint does not
/// report one: 55 minutes, under the backend's 60 minute token lifetime.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 55 * 60;

/// Credentials for the signed-in user.
///
/// The authoritative copy lives in the external session store; the client
/// only caches it. Field names follow the store's camelCase JSON and
/// `accessTokenExpires` is a millisecond Unix timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token attached to outgoing requests
    pub access_token: String,
    /// Token exchanged for a new access token on 401
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Advisory expiry of the access token
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub access_token_expires: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a session without expiry metadata.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            access_token_expires: None,
        }
    }

    /// Sets the access token expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.access_token_expires = Some(expires);
        self
    }

    /// Builds the session that replaces this one after a successful refresh.
    ///
    /// The refresh token is carried over when the grant omits one. Expiry is
    /// `now + expires_in` when reported, else `now + 55 minutes`.
    #[must_use]
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let secs = grant.expires_in.map_or(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS, |secs| {
            i64::try_from(secs).unwrap_or(i64::MAX)
        });
        let access_token_expires =
            TimeDelta::try_seconds(secs).and_then(|delta| now.checked_add_signed(delta));

        Self {
            access_token: grant.access,
            refresh_token: grant.refresh.or_else(|| self.refresh_token.clone()),
            access_token_expires,
        }
    }

    /// Check if the token can be refreshed.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Check if the access token is expired or will expire within the given buffer.
    ///
    /// Sessions without expiry metadata never report as expired.
    #[must_use]
    pub fn is_expired_or_expiring(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        self.access_token_expires.is_some_and(|expires| {
            TimeDelta::try_seconds(buffer_seconds)
                .and_then(|buffer| now.checked_add_signed(buffer))
                .is_none_or(|deadline| deadline >= expires)
        })
    }

    /// Time until expiry in seconds, or None if no expiry.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.access_token_expires
            .map(|expires| (expires - now).num_seconds())
    }
}

/// Body of `POST /api/token/refresh/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRefreshRequest {
    /// The refresh token
    pub refresh: String,
}

/// Response of the token refresh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// New access token
    pub access: String,
    /// Rotated refresh token, when the backend rotates them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    /// Access token lifetime in seconds, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenGrant {
    /// Creates a grant carrying only an access token.
    #[must_use]
    pub fn access_only(access: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: None,
            expires_in: None,
        }
    }
}
