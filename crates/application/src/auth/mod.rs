//! Session handling for the API client.
//!
//! This module provides:
//! - The single-flight refresh coordinator with its FIFO waiter queue
//! - A short-lived cache in front of the external session store
//! - An in-memory session store with expiry status reporting
//! - Auth events broadcast to front-end shells

mod coordinator;
mod events;
mod session_cache;
mod token_store;

pub use coordinator::{RefreshCoordinator, RefreshLease, RefreshOutcome, RefreshTicket, RefreshWaiter};
pub use events::{AuthEvent, RefreshState};
pub use session_cache::SessionCache;
pub use token_store::{MemorySessionStore, TokenStatus};
