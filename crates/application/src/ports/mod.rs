//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the client core and external systems.
//! Each port is a trait implemented by adapters in the infrastructure layer.

mod clock;
mod session_provider;
mod sign_out;
mod token_refresher;
mod transport;

pub use clock::Clock;
pub use session_provider::SessionProvider;
pub use sign_out::SignOutHandler;
pub use token_refresher::TokenRefresher;
pub use transport::{HttpTransport, TransportError};
