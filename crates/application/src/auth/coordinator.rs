//! Single-flight token refresh coordination.
//!
//! The first request to hit a 401 while no refresh is running becomes the
//! *leader* and performs the refresh. Requests that hit a 401 while the
//! leader is working become *followers*: each gets a one-shot slot in a FIFO
//! queue that the leader fulfils when the refresh settles.
//!
//! The state flag and the queue share one mutex, so check-and-set and
//! push/drain are atomic with respect to each other. The lock is never held
//! across an `.await`.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tally_domain::{AuthError, Session};
use tokio::sync::oneshot;

use super::RefreshState;

/// Result of one refresh attempt, shared by the leader and every follower.
pub type RefreshOutcome = Result<Session, AuthError>;

/// Gate and waiter queue for token refreshes.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: RefreshState,
    waiters: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

/// What a request that received a 401 should do next.
#[derive(Debug)]
pub enum RefreshTicket<'a> {
    /// Perform the refresh and settle the lease.
    Leader(RefreshLease<'a>),
    /// Wait for the in-flight refresh.
    Follower(RefreshWaiter),
}

impl RefreshCoordinator {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the refresh protocol.
    ///
    /// Returns a lease if no refresh is running (the flag is set before this
    /// returns), otherwise enqueues a waiter behind the running refresh.
    pub fn acquire(&self) -> RefreshTicket<'_> {
        let mut inner = self.inner.lock();
        if inner.state.is_in_progress() {
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            return RefreshTicket::Follower(RefreshWaiter { rx });
        }
        inner.state = RefreshState::Refreshing;
        RefreshTicket::Leader(RefreshLease {
            coordinator: self,
            settled: false,
        })
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RefreshState {
        self.inner.lock().state
    }

    /// Returns the number of requests queued behind the running refresh.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    fn settle(&self, outcome: &RefreshOutcome, next: RefreshState) -> usize {
        let waiters = {
            let mut inner = self.inner.lock();
            inner.state = next;
            std::mem::take(&mut inner.waiters)
        };

        let count = waiters.len();
        for waiter in waiters {
            // The follower may have been cancelled; its slot is simply dropped.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Exclusive right to run the current refresh.
///
/// Dropping an unsettled lease (leader cancelled or panicked) clears the
/// flag and rejects every follower with `AuthError::RefreshAborted`.
#[derive(Debug)]
#[must_use = "a lease must be completed, or dropped to abort the refresh"]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl RefreshLease<'_> {
    /// Settles the refresh: clears the flag and delivers `outcome` to every
    /// queued follower in arrival order.
    ///
    /// Returns the number of followers that were queued.
    pub fn complete(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        let next = if outcome.is_ok() {
            RefreshState::Idle
        } else {
            RefreshState::Failed
        };
        self.coordinator.settle(outcome, next)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .settle(&Err(AuthError::RefreshAborted), RefreshState::Idle);
        }
    }
}

/// A follower's slot in the refresh queue.
#[derive(Debug)]
pub struct RefreshWaiter {
    rx: oneshot::Receiver<RefreshOutcome>,
}

impl RefreshWaiter {
    /// Waits for the running refresh to settle.
    pub async fn wait(self) -> RefreshOutcome {
        self.rx.await.unwrap_or(Err(AuthError::RefreshAborted))
    }
}
