//! Token provider fake.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use stratus_protocol::{AzureCredentials, AzureEnvironment, BrokerError, TokenProvider};

/// Hands out a fixed token, or always fails, and counts requests.
pub struct StaticTokenProvider {
    token: Result<String, String>,
    calls: AtomicUsize,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        Self {
            token: Ok(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with an auth error carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            token: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(
        &self,
        _environment: &AzureEnvironment,
        _credentials: &AzureCredentials,
        _api_version: &str,
    ) -> Result<String, BrokerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.clone().map_err(BrokerError::Auth)
    }
}
