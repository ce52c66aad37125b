//! HTTP mock server helpers for testing outbound HTTP calls.
//!
//! This module provides a thin wrapper around `wiremock` for declarative
//! HTTP stubbing of the Personalization API.
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::common::http_mock::MockHttpServer;
//!
//! #[tokio::test]
//! async fn test_lookup() {
//!     let server = MockHttpServer::start().await;
//!
//!     server
//!         .expect_get("/v4/dr")
//!         .with_query_param("api_key", "test-api-key")
//!         .respond_with_json(json!({"age": "30-40"}))
//!         .mount()
//!         .await;
//!
//!     // Point the client at server.url("/v4/dr")
//! }
//! ```
//!
//! # Patterns
//!
//! - **Success response**: `.respond_with_json(value)` or `.respond_with_body(string)`
//! - **Error response**: `.respond_with_status(404)`, optionally with a body
//! - **Timeout simulation**: `.respond_with_delay(Duration::from_secs(30))`
//! - **Request verification**: `.expect_times(1)` then `server.verify().await`
//! - **Wire inspection**: `server.received_queries().await` returns raw query strings

use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer, Request, ResponseTemplate};

/// Stub HTTP server for one test.
pub struct MockHttpServer {
    server: MockServer,
}

impl MockHttpServer {
    /// Start a server on a random local port.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Absolute URL of `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server.uri())
    }

    /// Underlying wiremock server, for matchers this wrapper does not cover.
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Start stubbing a GET on `path`.
    pub fn expect_get(&self, request_path: &str) -> MockExpectation<'_> {
        MockExpectation {
            server: &self.server,
            builder: Mock::given(method("GET")).and(path(request_path)),
            status: 200,
            body: None,
            delay: None,
            expected_calls: None,
        }
    }

    /// Assert every `expect_times` expectation was met.
    pub async fn verify(&self) {
        self.server.verify().await;
    }

    /// Every request the server has seen, in arrival order.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Raw (still encoded) query string of every request, in arrival order.
    pub async fn received_queries(&self) -> Vec<String> {
        self.received_requests()
            .await
            .iter()
            .map(|request| request.url.query().unwrap_or_default().to_string())
            .collect()
    }
}

enum Body {
    Json(Value),
    Text(String),
}

/// Builder for one stubbed response.
pub struct MockExpectation<'a> {
    server: &'a MockServer,
    builder: MockBuilder,
    status: u16,
    body: Option<Body>,
    delay: Option<Duration>,
    expected_calls: Option<u64>,
}

impl MockExpectation<'_> {
    /// Only match requests carrying this header value.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.and(header(name, value));
        self
    }

    /// Only match requests with this (decoded) query parameter.
    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.and(query_param(name, value));
        self
    }

    pub fn respond_with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn respond_with_json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn respond_with_body(mut self, body: &str) -> Self {
        self.body = Some(Body::Text(body.to_string()));
        self
    }

    pub fn respond_with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn expect_times(mut self, times: u64) -> Self {
        self.expected_calls = Some(times);
        self
    }

    /// Register the stub with the server.
    pub async fn mount(self) {
        let mut response = ResponseTemplate::new(self.status);
        response = match self.body {
            Some(Body::Json(value)) => response.set_body_json(value),
            Some(Body::Text(text)) => response.set_body_string(text),
            None => response,
        };
        if let Some(delay) = self.delay {
            response = response.set_delay(delay);
        }

        let mut mock = self.builder.respond_with(response);
        if let Some(times) = self.expected_calls {
            mock = mock.expect(times);
        }
        mock.mount(self.server).await;
    }
}
