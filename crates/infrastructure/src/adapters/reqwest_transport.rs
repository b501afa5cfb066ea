//! HTTP transport implementation using reqwest.
//!
//! This adapter implements the `HttpTransport` port. It resolves request
//! paths against the configured base URL and performs the actual I/O; all
//! auth decisions are made by `ApiClient` before a request gets here.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use tally_application::ports::{HttpTransport, TransportError};
use tally_domain::{ApiRequest, ApiResponse, HttpMethod};
use tracing::debug;

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// HTTP transport backed by `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url` with default settings.
    ///
    /// Default configuration:
    /// - Follow redirects: up to 10
    /// - TLS verification: enabled
    /// - No request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new(base_url: Url) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Creates a transport with a custom reqwest client.
    #[must_use]
    pub const fn with_client(client: Client, base_url: Url) -> Self {
        Self {
            client,
            base_url,
            timeout: None,
        }
    }

    /// Sets a per-request timeout. `None` waits indefinitely.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The base URL relative paths are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the absolute URL for `request`, including query parameters.
    ///
    /// Relative paths are appended to the base URL as-is, so a base URL with
    /// a path prefix keeps it.
    fn resolve(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let raw = if request.path.contains("://") {
            request.path.clone()
        } else {
            let base = self.base_url.as_str().trim_end_matches('/');
            let path = request.path.trim_start_matches('/');
            format!("{base}/{path}")
        };

        let mut url =
            Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{e}: {raw}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.pairs());
        }
        Ok(url)
    }

    /// Converts domain `HttpMethod` to reqwest `Method`.
    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Maps reqwest errors to `TransportError`.
    fn map_error(error: &reqwest::Error, timeout_ms: u64) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout { timeout_ms };
        }

        let host = || {
            error
                .url()
                .and_then(Url::host_str)
                .unwrap_or("unknown")
                .to_string()
        };

        if error.is_connect() {
            let message = error.to_string();
            let lower = message.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                return TransportError::DnsError {
                    host: host(),
                    message,
                };
            }
            if lower.contains("refused") {
                return TransportError::ConnectionRefused {
                    host: host(),
                    port: error
                        .url()
                        .and_then(Url::port_or_known_default)
                        .unwrap_or(80),
                };
            }
            return TransportError::ConnectionFailed(message);
        }

        if error.is_redirect() {
            return TransportError::TooManyRedirects { max: MAX_REDIRECTS };
        }

        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.resolve(request)?;
        let timeout_ms = self
            .timeout
            .map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));

        let start = Instant::now();

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), url);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        for header in request.headers.iter() {
            builder = builder.header(&header.name, &header.value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(&e, timeout_ms))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Other(format!("Failed to read body: {e}")))?
            .to_vec();

        let duration = start.elapsed();
        debug!(status, elapsed_ms = duration.as_millis(), "Response received");

        Ok(ApiResponse::new(status, headers, body, duration))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(base: &str) -> ReqwestTransport {
        ReqwestTransport::new(Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn test_to_reqwest_method() {
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Get),
            Method::GET
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Patch),
            Method::PATCH
        );
        assert_eq!(
            ReqwestTransport::to_reqwest_method(HttpMethod::Delete),
            Method::DELETE
        );
    }

    #[test]
    fn test_resolve_keeps_base_prefix_and_appends_query() {
        let t = transport("https://erp.example.com/backend/");
        let request = ApiRequest::get("/api/estimates/").with_query("page", "2");

        let url = t.resolve(&request).unwrap();

        assert_eq!(
            url.as_str(),
            "https://erp.example.com/backend/api/estimates/?page=2"
        );
    }

    #[test]
    fn test_resolve_absolute_url() {
        let t = transport("https://erp.example.com");
        let request = ApiRequest::get("https://other.example.com/api/x/");
        assert_eq!(
            t.resolve(&request).unwrap().as_str(),
            "https://other.example.com/api/x/"
        );
    }

    #[tokio::test]
    async fn test_execute_sends_headers_query_and_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/customers/"))
            .and(query_param("draft", "true"))
            .and(header("Authorization", "Bearer tok1"))
            .and(body_json(json!({ "name": "Acme" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let mut request = ApiRequest::post("/api/customers/")
            .with_query("draft", "true")
            .with_body(json!({ "name": "Acme" }));
        request.set_bearer("tok1");

        let response = transport(&server.uri()).execute(&request).await.unwrap();

        assert_eq!(response.status.as_u16(), 201);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.json_body::<serde_json::Value>().unwrap(), json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn test_execute_returns_non_success_as_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/invoices/"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let response = transport(&server.uri())
            .execute(&ApiRequest::get("/api/invoices/"))
            .await
            .unwrap();

        assert!(response.status.is_unauthorized());
        assert_eq!(response.text(), "expired");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let result = transport(&server.uri())
            .with_timeout(Some(Duration::from_millis(50)))
            .execute(&ApiRequest::get("/slow"))
            .await;

        assert_eq!(result, Err(TransportError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let result = transport("http://127.0.0.1:1")
            .execute(&ApiRequest::get("/api/x/"))
            .await;

        assert!(matches!(
            result,
            Err(TransportError::ConnectionRefused { .. } | TransportError::ConnectionFailed(_))
        ));
    }
}
