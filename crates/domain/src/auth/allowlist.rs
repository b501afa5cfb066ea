//! Paths that must never carry credentials.

use crate::request::ApiRequest;

/// Endpoints exempt from `Authorization`: registration, initial token
/// issuance and the token refresh endpoint itself.
const DEFAULT_NO_AUTH_PATHS: &[&str] = &["/api/register/", "/api/token/", "/api/token/refresh/"];

/// Set of endpoint paths that are sent without a bearer token.
///
/// Matching is exact on the route (query string and origin ignored),
/// tolerant of a missing leading slash and of a trailing slash mismatch.
/// `/api/token/` does not exempt `/api/token/verify/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoAuthPaths {
    paths: Vec<String>,
}

impl NoAuthPaths {
    /// Creates an empty allowlist.
    #[must_use]
    pub const fn empty() -> Self {
        Self { paths: Vec::new() }
    }

    /// Adds a path to the allowlist.
    #[must_use]
    pub fn with_path(mut self, path: &str) -> Self {
        let normalized = normalize(path);
        if !self.paths.contains(&normalized) {
            self.paths.push(normalized);
        }
        self
    }

    /// Returns true if the route is exempt from credentials.
    #[must_use]
    pub fn contains(&self, route: &str) -> bool {
        let route = normalize(route);
        self.paths.iter().any(|p| *p == route)
    }

    /// Returns true if the request targets an exempt endpoint.
    #[must_use]
    pub fn exempts(&self, request: &ApiRequest) -> bool {
        self.contains(request.route())
    }

    /// Returns the normalized paths.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl Default for NoAuthPaths {
    fn default() -> Self {
        DEFAULT_NO_AUTH_PATHS
            .iter()
            .fold(Self::empty(), |list, path| list.with_path(path))
    }
}

impl<S: AsRef<str>> FromIterator<S> for NoAuthPaths {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |list, path| list.with_path(path.as_ref()))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
