//! Stratus Security Module
//!
//! Provides:
//! - **AzureTokenProvider**: service principal tokens for the resource manager

pub mod azure;

pub use azure::{AzureTokenProvider, TokenResponse};
