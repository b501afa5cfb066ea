//! Authentication domain types

mod allowlist;
mod error;
mod session;

pub use allowlist::NoAuthPaths;
pub use error::AuthError;
pub use session::{DEFAULT_ACCESS_TOKEN_LIFETIME_SECS, Session, TokenGrant, TokenRefreshRequest};
