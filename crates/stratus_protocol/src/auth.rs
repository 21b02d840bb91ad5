//! Token acquisition seam.

use crate::environment::AzureEnvironment;
use crate::error::BrokerError;
use crate::request::AzureCredentials;
use async_trait::async_trait;

/// Produces bearer tokens for the resource manager.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(
        &self,
        environment: &AzureEnvironment,
        credentials: &AzureCredentials,
        api_version: &str,
    ) -> Result<String, BrokerError>;
}
