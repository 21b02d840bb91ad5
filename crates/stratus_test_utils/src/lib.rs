//! Stratus Test Utilities
//!
//! In-memory fakes for the broker's collaborators.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratus_test_utils::{fixtures, FakeArm, StaticTokenProvider};
//!
//! #[tokio::test]
//! async fn test_provision() {
//!     let arm = Arc::new(FakeArm::new());
//!     let tokens = Arc::new(StaticTokenProvider::new("token"));
//!     let broker = ApiManagementBroker::new(BrokerConfig::default(), arm.clone(), tokens);
//!
//!     broker.provision(fixtures::request(fixtures::STANDARD_PLAN_ID, "svc1")).await.unwrap();
//!     assert_eq!(arm.count(Method::Put, "/service/svc1"), 1);
//! }
//! ```

pub mod arm;
pub mod fixtures;
pub mod tokens;

pub use arm::FakeArm;
pub use tokens::StaticTokenProvider;
