//! Personalization API client.
//!
//! [`ProfileLookup`] has a single required operation, [`ProfileLookup::lookup`];
//! every query method is a provided method that assembles a [`QueryRequest`]
//! and hands it over. [`PersonalizeClient`] implements `lookup` with one
//! HTTP GET per call.
//!
//! # Example
//!
//! ```ignore
//! use rapleaf_personalize::lookup::{PersonalizeClient, ProfileLookup};
//!
//! let client = PersonalizeClient::new("my-api-key")?;
//! match client.query_by_email("Jane@Example.com", false).await {
//!     Ok(attributes) => println!("age: {}", attributes["age"]),
//!     Err(err) => eprintln!("lookup failed: {err}"),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use super::request::{
    build_url, is_http_url, normalize_email, sha1_hex, QueryRequest, DEFAULT_BASE_URL,
};
use crate::config::ApiConfig;

/// Upper bound on one round trip, connect through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// User-agent sent with every request.
pub const USER_AGENT: &str = concat!("rapleaf-personalize/", env!("CARGO_PKG_VERSION"));

const REDACTED: &str = "REDACTED";

/// Decoded response payload. The shape is defined by the service and passed
/// through as-is.
pub type Attributes = Value;

/// Outcome of one lookup.
pub type LookupResult = Result<Attributes, LookupError>;

/// Errors that prevent a client from being built.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The HTTP transport could not be configured
    #[error("failed to configure HTTP transport: {0}")]
    Configuration(#[source] reqwest::Error),

    /// No access key was supplied
    #[error("access key is required")]
    MissingApiKey,

    /// Base URL is not an absolute http(s) URL
    #[error("invalid base URL '{0}': must be an absolute http:// or https:// URL")]
    InvalidBaseUrl(String),
}

/// Errors from a single lookup. These are returned, never raised, so a loop
/// over many lookups can carry on past a failed one.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Service answered with a status outside 2xx
    #[error("lookup failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Request never produced a response (DNS, TLS, connect, timeout)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl LookupError {
    /// HTTP status of the failed response, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

/// Lookup operations against the Personalization API.
///
/// Implementors only provide [`lookup`](Self::lookup). Use
/// [`PersonalizeClient`] for real HTTP calls, or `mock::MockProfileLookup`
/// in tests.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Issue one request and interpret the response.
    async fn lookup(&self, request: &QueryRequest) -> LookupResult;

    /// Look up an email address. With `hash_email` set, only the SHA-1
    /// digest of the lower-cased address is sent.
    async fn query_by_email(&self, email: &str, hash_email: bool) -> LookupResult {
        if hash_email {
            let digest = sha1_hex(&normalize_email(email));
            return self.query_by_sha1(&digest).await;
        }
        self.lookup(&QueryRequest::email(email)).await
    }

    /// Look up an MD5 hex digest of an email.
    async fn query_by_md5(&self, md5_email: &str) -> LookupResult {
        self.lookup(&QueryRequest::md5(md5_email)).await
    }

    /// Look up a SHA-1 hex digest of an email.
    async fn query_by_sha1(&self, sha1_email: &str) -> LookupResult {
        self.lookup(&QueryRequest::sha1(sha1_email)).await
    }

    /// Look up a person by name and postal address.
    async fn query_by_name_and_postal(
        &self,
        first_name: &str,
        last_name: &str,
        street: &str,
        city: &str,
        state: &str,
        email: Option<&str>,
    ) -> LookupResult {
        let request =
            QueryRequest::name_and_postal(first_name, last_name, street, city, state, email);
        self.lookup(&request).await
    }

    /// Look up a person by name and zip+4 code.
    async fn query_by_name_and_zip(
        &self,
        first_name: &str,
        last_name: &str,
        zip4: &str,
        email: Option<&str>,
    ) -> LookupResult {
        let request = QueryRequest::name_and_zip(first_name, last_name, zip4, email);
        self.lookup(&request).await
    }

    /// Run `requests` one after another. Returns one result per request,
    /// in order; failures do not stop the remaining lookups.
    async fn lookup_each(&self, requests: &[QueryRequest]) -> Vec<LookupResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.lookup(request).await);
        }
        results
    }
}

/// HTTP implementation of [`ProfileLookup`].
///
/// Owns one `reqwest::Client` for its whole lifetime; connections are pooled
/// and released when the client is dropped.
#[derive(Clone)]
pub struct PersonalizeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    log_request_urls: bool,
}

impl PersonalizeClient {
    /// Create a client for the public endpoint.
    ///
    /// # Errors
    /// Returns an error if `api_key` is empty or the transport cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a client for an alternate endpoint (a proxy or a stub server).
    ///
    /// # Errors
    /// Returns an error if `api_key` is empty, `base_url` is not an absolute
    /// http(s) URL, or the transport cannot be built.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = build_transport()?;
        Self::with_client(client, base_url, api_key)
    }

    /// Create a client around a caller-built `reqwest::Client`. The fixed
    /// timeout and user-agent are not applied to it.
    ///
    /// # Errors
    /// Returns an error if `api_key` is empty or `base_url` is not an
    /// absolute http(s) URL.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ClientError::MissingApiKey);
        }

        let base_url = base_url.into();
        validate_base_url(&base_url)?;

        Ok(Self {
            client,
            base_url,
            api_key,
            log_request_urls: false,
        })
    }

    /// Create a client from loaded configuration.
    ///
    /// # Errors
    /// Same as [`with_base_url`](Self::with_base_url).
    pub fn from_config(config: &ApiConfig) -> Result<Self, ClientError> {
        Ok(Self::with_base_url(config.base_url.clone(), config.api_key.clone())?
            .log_request_urls(config.log_request_urls))
    }

    /// Log every request URL at debug level, with the access key redacted.
    #[must_use]
    pub fn log_request_urls(mut self, enabled: bool) -> Self {
        self.log_request_urls = enabled;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The exact URL [`lookup`](ProfileLookup::lookup) would request.
    #[must_use]
    pub fn request_url(&self, request: &QueryRequest) -> String {
        build_url(&self.base_url, &self.api_key, request)
    }

    async fn fetch(&self, url: &str) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

impl fmt::Debug for PersonalizeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersonalizeClient")
            .field("base_url", &self.base_url)
            .field("api_key", &REDACTED)
            .field("log_request_urls", &self.log_request_urls)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProfileLookup for PersonalizeClient {
    async fn lookup(&self, request: &QueryRequest) -> LookupResult {
        if self.log_request_urls {
            tracing::debug!(
                url = %build_url(&self.base_url, REDACTED, request),
                "personalize request"
            );
        }

        let url = self.request_url(request);
        let (status, body) = match self.fetch(&url).await {
            Ok(parts) => parts,
            Err(err) => {
                tracing::warn!(error = %err, "personalize request failed");
                return Err(LookupError::Transport(err));
            }
        };

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                body = %body,
                "personalize lookup returned an error response"
            );
            return Err(LookupError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_attributes(&body))
    }
}

fn build_transport() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(false)
        .build()
        .map_err(ClientError::Configuration)
}

fn validate_base_url(base_url: &str) -> Result<(), ClientError> {
    if is_http_url(base_url) {
        Ok(())
    } else {
        Err(ClientError::InvalidBaseUrl(base_url.to_string()))
    }
}

/// Unparseable bodies decode to `Null`, same as an empty payload.
fn decode_attributes(body: &str) -> Attributes {
    serde_json::from_str(body).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "response body is not valid JSON");
        Value::Null
    })
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::missing_const_for_fn,
    clippy::must_use_candidate
)]
pub mod mock {
    //! Mock implementation for unit testing.

    use super::{LookupError, LookupResult, ProfileLookup, QueryRequest};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock implementation of `ProfileLookup` for unit tests.
    ///
    /// Queue responses with `push_result` and inspect the requests that
    /// reached `lookup` with `calls()`. With the queue empty, lookups fail
    /// with HTTP 404.
    pub struct MockProfileLookup {
        results: Mutex<VecDeque<LookupResult>>,
        calls: Mutex<Vec<QueryRequest>>,
    }

    impl MockProfileLookup {
        pub fn new() -> Self {
            Self {
                results: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Queue the result for the next `lookup` call.
        pub fn push_result(&self, result: LookupResult) {
            self.results.lock().unwrap().push_back(result);
        }

        /// Every request passed to `lookup`, in call order.
        pub fn calls(&self) -> Vec<QueryRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Default for MockProfileLookup {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProfileLookup for MockProfileLookup {
        async fn lookup(&self, request: &QueryRequest) -> LookupResult {
            self.calls.lock().unwrap().push(request.clone());

            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(LookupError::Http {
                        status: 404,
                        body: String::new(),
                    })
                })
        }
    }
}
