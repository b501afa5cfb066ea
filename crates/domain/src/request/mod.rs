//! HTTP Request domain types

mod header;
mod method;
mod query;
mod spec;

pub use header::{AUTHORIZATION, Header, Headers};
pub use method::HttpMethod;
pub use query::{QueryParam, QueryParams};
pub use spec::ApiRequest;
