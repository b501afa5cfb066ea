//! Tally Application - Ports and the authenticated client
//!
//! This crate defines the application layer with:
//! - Port traits (transport, session store, token refresher, sign-out, clock)
//! - The single-flight refresh coordinator and session cache
//! - `ApiClient`, the bearer-token request client used by every front-end view
//! - Application-level error handling

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod ports;

pub use auth::{
    AuthEvent, MemorySessionStore, RefreshCoordinator, RefreshState, SessionCache, TokenStatus,
};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use ports::{Clock, HttpTransport, SessionProvider, SignOutHandler, TokenRefresher, TransportError};
