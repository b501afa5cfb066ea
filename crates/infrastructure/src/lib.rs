//! Tally Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus environment configuration.

pub mod adapters;
pub mod auth;
pub mod config;

pub use adapters::{ManualClock, ReqwestTransport, SystemClock};
pub use auth::{HttpSessionStore, HttpTokenRefresher, RedirectSignOut};
pub use config::{ConfigError, Settings};
