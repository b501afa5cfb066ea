//! In-memory session store with expiry tracking.
//!
//! `MemorySessionStore` is the `SessionProvider` used by tests, by the CLI
//! when tokens come from the environment, and by any host that owns its
//! session in-process.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tally_domain::{AuthError, Session};
use tokio::sync::RwLock;

use crate::ports::SessionProvider;

/// Seconds before expiry at which a token is reported as expiring.
pub const EXPIRY_WARNING_SECS: i64 = 60;

/// Thread-safe in-memory session store.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<RwLock<Option<Session>>>,
    updates: Arc<RwLock<Vec<Session>>>,
}

impl MemorySessionStore {
    /// Create an empty (signed-out) store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(Some(session))),
            updates: Arc::default(),
        }
    }

    /// Replace the stored session without recording an update.
    pub async fn set(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    /// Get the stored session.
    pub async fn get(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Sessions written back through `SessionProvider::update`, oldest first.
    pub async fn updates(&self) -> Vec<Session> {
        self.updates.read().await.clone()
    }
}

#[async_trait]
impl SessionProvider for MemorySessionStore {
    async fn fetch(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.get().await)
    }

    async fn update(&self, session: &Session) -> Result<(), AuthError> {
        *self.session.write().await = Some(session.clone());
        self.updates.write().await.push(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        *self.session.write().await = None;
        Ok(())
    }
}

/// Status of the access token for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// No session.
    NotAuthenticated,
    /// Token is valid and not expiring soon.
    Valid {
        /// Seconds until expiry, or None if no expiry.
        seconds_remaining: Option<i64>,
    },
    /// Token is valid but will expire soon.
    Expiring {
        /// Seconds until expiry.
        seconds_remaining: i64,
        /// Whether the token can be refreshed.
        can_refresh: bool,
    },
    /// Token has expired.
    Expired {
        /// Whether the token can be refreshed.
        can_refresh: bool,
    },
}

impl TokenStatus {
    /// Classify `session` at `now`.
    #[must_use]
    pub fn of(session: Option<&Session>, now: DateTime<Utc>) -> Self {
        let Some(session) = session else {
            return Self::NotAuthenticated;
        };

        if session.is_expired_or_expiring(now, 0) {
            Self::Expired {
                can_refresh: session.can_refresh(),
            }
        } else if session.is_expired_or_expiring(now, EXPIRY_WARNING_SECS) {
            Self::Expiring {
                seconds_remaining: session.seconds_until_expiry(now).unwrap_or(0),
                can_refresh: session.can_refresh(),
            }
        } else {
            Self::Valid {
                seconds_remaining: session.seconds_until_expiry(now),
            }
        }
    }

    /// Returns true if the token needs attention (expiring or expired).
    #[must_use]
    pub const fn needs_attention(&self) -> bool {
        matches!(self, Self::Expiring { .. } | Self::Expired { .. })
    }

    /// Get a user-friendly display message.
    #[must_use]
    pub fn display_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Not signed in".to_string(),
            Self::Valid {
                seconds_remaining: Some(secs),
            } => {
                if *secs > 3600 {
                    format!("Valid for {} hours", secs / 3600)
                } else if *secs > 60 {
                    format!("Valid for {} minutes", secs / 60)
                } else {
                    format!("Valid for {secs} seconds")
                }
            }
            Self::Valid {
                seconds_remaining: None,
            } => "Valid (no expiry)".to_string(),
            Self::Expiring {
                seconds_remaining,
                can_refresh,
            } => {
                let refresh_hint = if *can_refresh {
                    " (refreshes on next 401)"
                } else {
                    ""
                };
                format!("Expiring in {seconds_remaining} seconds{refresh_hint}")
            }
            Self::Expired { can_refresh } => {
                if *can_refresh {
                    "Expired (can refresh)".to_string()
                } else {
                    "Expired".to_string()
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_stored_session() {
        let store = MemorySessionStore::with_session(Session::new("tok1", None));
        let session = store.fetch().await.unwrap();
        assert_eq!(session.unwrap().access_token, "tok1");
    }

    #[tokio::test]
    async fn test_update_replaces_and_records() {
        let store = MemorySessionStore::with_session(Session::new("tok1", None));
        store.update(&Session::new("tok2", None)).await.unwrap();

        assert_eq!(store.get().await.unwrap().access_token, "tok2");
        let updates = store.updates().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].access_token, "tok2");
    }

    #[tokio::test]
    async fn test_clear_signs_out() {
        let store = MemorySessionStore::with_session(Session::new("tok1", None));
        store.clear().await.unwrap();

        assert!(store.fetch().await.unwrap().is_none());
    }

    #[test]
    fn test_token_status_classification() {
        let session = Session::new("tok", Some("ref".to_string())).with_expiry(at(1000));

        assert_eq!(
            TokenStatus::of(Some(&session), at(0)),
            TokenStatus::Valid {
                seconds_remaining: Some(1000)
            }
        );
        assert_eq!(
            TokenStatus::of(Some(&session), at(970)),
            TokenStatus::Expiring {
                seconds_remaining: 30,
                can_refresh: true
            }
        );
        assert_eq!(
            TokenStatus::of(Some(&session), at(1000)),
            TokenStatus::Expired { can_refresh: true }
        );
        assert!(TokenStatus::of(Some(&session), at(970)).needs_attention());
    }

    #[test]
    fn test_token_status_display_messages() {
        assert_eq!(
            TokenStatus::NotAuthenticated.display_message(),
            "Not signed in"
        );

        assert!(
            TokenStatus::Valid {
                seconds_remaining: Some(7200)
            }
            .display_message()
            .contains("hours")
        );

        assert!(
            TokenStatus::Expiring {
                seconds_remaining: 30,
                can_refresh: true
            }
            .display_message()
            .contains("401")
        );
    }
}
