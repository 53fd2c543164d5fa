//! Shared harness for the HTTP workflow tests
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer, TEST_TOPIC};
//!
//! #[tokio::test]
//! async fn draft_arrives() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!     let (_id, state) = client.start_and_wait_for_draft(TEST_TOPIC).await;
//!     assert_eq!(state["status"], "interrupted");
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::MockLlm;
pub use server::TestServer;
