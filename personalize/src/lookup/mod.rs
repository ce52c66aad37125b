//! Personalization API lookups.
//!
//! # Architecture
//!
//! - [`QueryRequest`] - The five accepted fact patterns, with email
//!   normalization
//! - [`build_url`] - Keyed, URL-encoded request URL
//! - [`ProfileLookup`] - Trait defining the query operations
//! - [`PersonalizeClient`] - HTTP implementation using reqwest
//! - `mock::MockProfileLookup` - Mock for unit tests (behind `test-utils` feature)
//!
//! # Testing Patterns
//!
//! ## Unit Tests (Mock Implementation)
//!
//! ```ignore
//! use rapleaf_personalize::lookup::mock::MockProfileLookup;
//!
//! let mock = MockProfileLookup::new();
//! mock.push_result(Ok(json!({"age": "30-40"})));
//!
//! let attributes = my_report.enrich(&mock, "jane@example.com").await?;
//! assert_eq!(mock.calls(), vec![QueryRequest::email("jane@example.com")]);
//! ```
//!
//! ## Integration Tests (HTTP Stubbing)
//!
//! ```ignore
//! let server = MockHttpServer::start().await;
//!
//! server
//!     .expect_get("/v4/dr")
//!     .with_query_param("email", "jane@example.com")
//!     .respond_with_json(json!({"age": "30-40"}))
//!     .mount()
//!     .await;
//!
//! let client = PersonalizeClient::with_base_url(server.url("/v4/dr"), "test-key")?;
//! let attributes = client.query_by_email("jane@example.com", false).await?;
//! ```

mod client;
mod request;

pub use client::{
    Attributes, ClientError, LookupError, LookupResult, PersonalizeClient, ProfileLookup,
    REQUEST_TIMEOUT, USER_AGENT,
};
pub use request::{
    build_url, is_http_url, sha1_hex, QueryRequest, API_KEY_FIELD, DEFAULT_BASE_URL,
};

#[cfg(any(test, feature = "test-utils"))]
pub use client::mock;
