//! Common test utilities for integration tests.
//!
//! This module provides:
//!
//! - [`http_mock::MockHttpServer`] - Stubbed Personalization API endpoint
//! - [`log_capture::capture_logs`] - Record `tracing` output for assertions
//!
//! # Usage
//!
//! ```ignore
//! use crate::common::{http_mock::MockHttpServer, log_capture::capture_logs};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let logs = capture_logs();
//!     let server = MockHttpServer::start().await;
//!     // ...
//!     assert!(logs.contents().contains("404"));
//! }
//! ```

#![allow(dead_code)]

pub mod http_mock;
pub mod log_capture;

/// Path of the lookup endpoint on the stub server.
pub const LOOKUP_PATH: &str = "/v4/dr";

/// Access key used by tests unless a test needs its own.
pub const TEST_API_KEY: &str = "test-api-key";
