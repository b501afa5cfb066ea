//! Auth adapters: refresh endpoint, session service and sign-out.

mod session_store;
mod sign_out;
mod token_refresher;

pub use session_store::HttpSessionStore;
pub use sign_out::RedirectSignOut;
pub use token_refresher::{HttpTokenRefresher, TOKEN_REFRESH_PATH};
