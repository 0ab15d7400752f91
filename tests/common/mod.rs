//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, ACME_DOMAIN, GOOD_TOKEN};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_create_shop() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.create_shop(ACME_DOMAIN, GOOD_TOKEN).await;
//!     assert_eq!(response.status(), StatusCode::CREATED);
//! }
//! ```

mod client;
mod constants;
mod platform_stub;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use platform_stub::PlatformStub;
pub use server::TestServer;
