//! Tally Domain - Core types for the authenticated API client
//!
//! This crate defines the request/response model, the session model and
//! the authentication rules shared by the application and infrastructure
//! layers. All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod request;
pub mod response;

pub use auth::{
    AuthError, DEFAULT_ACCESS_TOKEN_LIFETIME_SECS, NoAuthPaths, Session, TokenGrant,
    TokenRefreshRequest,
};
pub use error::{DomainError, DomainResult};
pub use request::{
    AUTHORIZATION, ApiRequest, Header, Headers, HttpMethod, QueryParam, QueryParams,
};
pub use response::{ApiResponse, StatusCode};
