//! Environment configuration.
//!
//! ## Environment Variables
//! - `TALLY_API_BASE_URL`: Backend base URL (required)
//! - `TALLY_SESSION_URL`: Session service base URL (defaults to the API base URL)
//! - `TALLY_SESSION_CACHE_TTL_SECS`: Seconds a fetched session is reused (default 30)
//! - `TALLY_REQUEST_TIMEOUT_MS`: Per-request timeout (default: none)
//! - `TALLY_SIGNIN_PATH`: Redirect target after a forced sign-out (default `/auth/signin`)
//! - `TALLY_ACCESS_TOKEN` / `TALLY_REFRESH_TOKEN`: Seed an in-memory session
//!   instead of reading the session service

use std::time::Duration;

use reqwest::Url;
use tally_application::ClientConfig;
use tally_application::config::{DEFAULT_SESSION_CACHE_TTL, DEFAULT_SIGNIN_PATH};
use tally_domain::Session;
use thiserror::Error;

/// Backend base URL.
pub const ENV_API_BASE_URL: &str = "TALLY_API_BASE_URL";
/// Session service base URL.
pub const ENV_SESSION_URL: &str = "TALLY_SESSION_URL";
/// Session cache TTL in seconds.
pub const ENV_SESSION_CACHE_TTL_SECS: &str = "TALLY_SESSION_CACHE_TTL_SECS";
/// Request timeout in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TALLY_REQUEST_TIMEOUT_MS";
/// Sign-in redirect target.
pub const ENV_SIGNIN_PATH: &str = "TALLY_SIGNIN_PATH";
/// Seed access token.
pub const ENV_ACCESS_TOKEN: &str = "TALLY_ACCESS_TOKEN";
/// Seed refresh token.
pub const ENV_REFRESH_TOKEN: &str = "TALLY_REFRESH_TOKEN";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {message}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Parse error.
        message: String,
    },
}

/// Runtime settings for wiring an `ApiClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Backend base URL.
    pub base_url: Url,
    /// Session service base URL.
    pub session_url: Url,
    /// Session cache TTL.
    pub session_cache_ttl: Duration,
    /// Optional per-request timeout.
    pub request_timeout: Option<Duration>,
    /// Redirect target after a forced sign-out.
    pub signin_path: String,
    /// Seed access token.
    pub access_token: Option<String>,
    /// Seed refresh token.
    pub refresh_token: Option<String>,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through `lookup`, which returns a variable's value.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    /// Returns `ConfigError` if the base URL is missing or any value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = parse_url(
            ENV_API_BASE_URL,
            &get(ENV_API_BASE_URL).ok_or(ConfigError::Missing(ENV_API_BASE_URL))?,
        )?;
        let session_url = match get(ENV_SESSION_URL) {
            Some(raw) => parse_url(ENV_SESSION_URL, &raw)?,
            None => base_url.clone(),
        };

        let session_cache_ttl = match get(ENV_SESSION_CACHE_TTL_SECS) {
            Some(raw) => Duration::from_secs(parse_u64(ENV_SESSION_CACHE_TTL_SECS, &raw)?),
            None => DEFAULT_SESSION_CACHE_TTL,
        };
        let request_timeout = get(ENV_REQUEST_TIMEOUT_MS)
            .map(|raw| parse_u64(ENV_REQUEST_TIMEOUT_MS, &raw).map(Duration::from_millis))
            .transpose()?;

        Ok(Self {
            base_url,
            session_url,
            session_cache_ttl,
            request_timeout,
            signin_path: get(ENV_SIGNIN_PATH).unwrap_or_else(|| DEFAULT_SIGNIN_PATH.to_string()),
            access_token: get(ENV_ACCESS_TOKEN),
            refresh_token: get(ENV_REFRESH_TOKEN),
        })
    }

    /// The `ClientConfig` described by these settings.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_session_cache_ttl(self.session_cache_ttl)
            .with_signin_path(self.signin_path.clone())
    }

    /// The session seeded from the environment, if an access token was given.
    #[must_use]
    pub fn seeded_session(&self) -> Option<Session> {
        self.access_token
            .as_ref()
            .map(|access| Session::new(access.clone(), self.refresh_token.clone()))
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}

fn parse_u64(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}
