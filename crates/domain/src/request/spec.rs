//! Outgoing API request type

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AUTHORIZATION, Header, Headers, HttpMethod, QueryParam, QueryParams};
use crate::error::{DomainError, DomainResult};

/// A request issued through the authenticated client.
///
/// `path` is relative to the configured base URL (absolute URLs are
/// accepted and sent as-is). `retried` records whether this request has
/// already been replayed once after a 401; it is never reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Correlation id for logs
    pub id: Uuid,
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL, e.g. `/api/invoices/`
    pub path: String,
    /// Query parameters appended to the URL
    #[serde(default)]
    pub query: QueryParams,
    /// HTTP headers
    #[serde(default)]
    pub headers: Headers,
    /// JSON body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Set once the request has been replayed after a 401
    #[serde(default)]
    pub retried: bool,
}

impl ApiRequest {
    /// Creates a request with the given method and path.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            method,
            path: path.into(),
            query: QueryParams::new(),
            headers: Headers::new(),
            body: None,
            retried: false,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Creates a PUT request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    /// Creates a PATCH request.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    /// Creates a DELETE request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.add(QueryParam::new(key, value));
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(Header::new(name, value));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches `Authorization: Bearer <token>`, replacing any previous value.
    pub fn set_bearer(&mut self, access_token: &str) {
        self.headers
            .set(AUTHORIZATION, format!("Bearer {access_token}"));
    }

    /// Removes any `Authorization` header. Returns true if one was present.
    pub fn clear_authorization(&mut self) -> bool {
        self.headers.remove(AUTHORIZATION)
    }

    /// Returns the current `Authorization` header value, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)
    }

    /// Checks that the request can be sent.
    ///
    /// # Errors
    /// - `DomainError::InvalidUrl` for an empty path or one containing whitespace
    /// - `DomainError::InvalidHeader` for a header that cannot be sent
    /// - `DomainError::InvalidBody` for a body on a GET or DELETE
    pub fn validate(&self) -> DomainResult<()> {
        if self.path.trim().is_empty() || self.path.contains(char::is_whitespace) {
            return Err(DomainError::InvalidUrl(format!("bad path `{}`", self.path)));
        }
        for header in self.headers.iter() {
            header.validate()?;
        }
        if self.body.is_some() && !self.method.has_body() {
            return Err(DomainError::InvalidBody(format!(
                "{} requests do not carry a body",
                self.method
            )));
        }
        Ok(())
    }

    /// Returns the path component without query string or fragment.
    ///
    /// Absolute URLs are reduced to their path.
    #[must_use]
    pub fn route(&self) -> &str {
        let path = match self.path.find("://") {
            Some(scheme_end) => {
                let rest = &self.path[scheme_end + 3..];
                rest.find('/').map_or("/", |i| &rest[i..])
            }
            None => self.path.as_str(),
        };
        path.split(['?', '#']).next().unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_request_is_not_retried() {
        let req = ApiRequest::get("/api/invoices/");
        assert_eq!(req.method, HttpMethod::Get);
        assert!(!req.retried);
        assert!(req.authorization().is_none());
    }

    #[test]
    fn test_set_bearer_replaces() {
        let mut req = ApiRequest::get("/api/invoices/").with_header("authorization", "Bearer a");
        req.set_bearer("b");
        assert_eq!(req.authorization(), Some("Bearer b"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_validate() {
        assert!(ApiRequest::get("/api/invoices/").validate().is_ok());
        assert!(matches!(
            ApiRequest::get("").validate(),
            Err(DomainError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiRequest::get("/api/in voices/").validate(),
            Err(DomainError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiRequest::get("/api/x/")
                .with_body(serde_json::json!({}))
                .validate(),
            Err(DomainError::InvalidBody(_))
        ));
        assert!(matches!(
            ApiRequest::post("/api/x/")
                .with_header("X Bad", "1")
                .validate(),
            Err(DomainError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_route_strips_query_and_origin() {
        assert_eq!(
            ApiRequest::get("/api/estimates/?page=2").route(),
            "/api/estimates/"
        );
        assert_eq!(
            ApiRequest::post("https://erp.example.com/api/token/refresh/#x").route(),
            "/api/token/refresh/"
        );
        assert_eq!(ApiRequest::get("https://erp.example.com").route(), "/");
    }
}
