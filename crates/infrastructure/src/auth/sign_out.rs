//! Forced sign-out adapter.

use std::sync::Arc;

use async_trait::async_trait;
use tally_application::ports::{SessionProvider, SignOutHandler};
use tokio::sync::watch;
use tracing::{info, warn};

/// Ends the session in the store and publishes where the shell should
/// navigate next.
///
/// The shell watches [`RedirectSignOut::redirects`]; the latest value is the
/// redirect target of the most recent sign-out.
pub struct RedirectSignOut {
    sessions: Arc<dyn SessionProvider>,
    redirect: watch::Sender<Option<String>>,
}

impl RedirectSignOut {
    /// Creates a sign-out handler that clears `sessions`.
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionProvider>) -> Self {
        let (redirect, _) = watch::channel(None);
        Self { sessions, redirect }
    }

    /// Subscribes to redirect targets.
    #[must_use]
    pub fn redirects(&self) -> watch::Receiver<Option<String>> {
        self.redirect.subscribe()
    }
}

impl std::fmt::Debug for RedirectSignOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectSignOut")
            .field("redirect", &*self.redirect.borrow())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SignOutHandler for RedirectSignOut {
    async fn sign_out(&self, redirect_to: &str) {
        if let Err(e) = self.sessions.clear().await {
            warn!(error = %e, "Failed to clear session during sign-out");
        }
        info!(redirect_to, "Signed out");
        self.redirect.send_replace(Some(redirect_to.to_string()));
    }
}
