//! Azure Active Directory Authentication
//!
//! Implements the client credentials grant against the v1 token endpoint.
//! Uses raw HTTP requests (no heavy SDK dependencies).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use stratus_protocol::{AzureCredentials, AzureEnvironment, BrokerError, TokenProvider};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_SKEW: Duration = Duration::from_secs(300);

/// Token Response
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Azure returns this as a string on v1, a number elsewhere
    #[serde(default)]
    pub expires_in: serde_json::Value,
}

impl TokenResponse {
    pub fn expires_in_secs(&self) -> u64 {
        match &self.expires_in {
            serde_json::Value::Number(n) => n.as_u64().unwrap_or(3600),
            serde_json::Value::String(s) => s.parse().unwrap_or(3600),
            _ => 3600,
        }
    }
}

/// Token Error Response
#[derive(Debug, Deserialize)]
pub struct TokenError {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Service principal token provider with a per-principal cache.
pub struct AzureTokenProvider {
    http_client: reqwest::Client,
    authority_override: Option<String>,
    cache: Mutex<HashMap<String, CachedToken>>,
}

impl AzureTokenProvider {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            authority_override: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Send token requests to `authority` instead of the environment's AD
    /// endpoint (sovereign proxies, local stubs).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority_override = Some(authority.into());
        self
    }

    fn token_url(&self, environment: &AzureEnvironment, tenant_id: &str) -> String {
        let authority = self
            .authority_override
            .as_deref()
            .unwrap_or(environment.active_directory_endpoint);
        format!("{}/{}/oauth2/token", authority.trim_end_matches('/'), tenant_id)
    }

    fn cache_key(environment: &AzureEnvironment, credentials: &AzureCredentials) -> String {
        format!(
            "{}|{}|{}",
            environment.name, credentials.tenant_id, credentials.client_id
        )
    }

    /// Request a fresh token, bypassing the cache.
    pub async fn request_token(
        &self,
        environment: &AzureEnvironment,
        credentials: &AzureCredentials,
        api_version: &str,
    ) -> Result<TokenResponse> {
        validate_credentials(credentials)?;

        let url = self.token_url(environment, &credentials.tenant_id);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("resource", environment.resource_manager_endpoint),
        ];

        tracing::debug!(
            "Requesting token from {} for client {}",
            url,
            credentials.client_id
        );

        let response = self
            .http_client
            .post(&url)
            .query(&[("api-version", api_version)])
            .form(&form)
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        if response.status().is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .context("Failed to parse token response")?;
            tracing::info!("Obtained access token for client {}", credentials.client_id);
            return Ok(token);
        }

        let status = response.status();
        let error: TokenError = response
            .json()
            .await
            .with_context(|| format!("Token request failed with HTTP {}", status))?;
        anyhow::bail!(
            "Token request failed: {} - {}",
            error.error,
            error.error_description.unwrap_or_default()
        )
    }

    async fn cached(&self, key: &str) -> Option<String> {
        let mut cache = self.cache.lock().await;
        if let Some(entry) = cache.get(key) {
            if entry.refresh_at > Instant::now() {
                return Some(entry.access_token.clone());
            }
        }
        cache.remove(key);
        None
    }

    async fn store(&self, key: String, token: &TokenResponse) {
        let lifetime = Duration::from_secs(token.expires_in_secs()).saturating_sub(EXPIRY_SKEW);
        let now = Instant::now();
        let mut cache = self.cache.lock().await;
        cache.retain(|_, entry| entry.refresh_at > now);
        cache.insert(
            key,
            CachedToken {
                access_token: token.access_token.clone(),
                refresh_at: now + lifetime,
            },
        );
    }
}

impl Default for AzureTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_credentials(credentials: &AzureCredentials) -> Result<()> {
    let missing: Vec<&str> = [
        ("tenantId", credentials.tenant_id.as_str()),
        ("clientId", credentials.client_id.as_str()),
        ("clientSecret", credentials.client_secret.as_str()),
    ]
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        anyhow::bail!("Missing credentials: {}", missing.join(", "));
    }
    Ok(())
}

#[async_trait]
impl TokenProvider for AzureTokenProvider {
    async fn get_token(
        &self,
        environment: &AzureEnvironment,
        credentials: &AzureCredentials,
        api_version: &str,
    ) -> Result<String, BrokerError> {
        let key = Self::cache_key(environment, credentials);
        if let Some(token) = self.cached(&key).await {
            tracing::debug!("Using cached token for client {}", credentials.client_id);
            return Ok(token);
        }

        let token = self
            .request_token(environment, credentials, api_version)
            .await
            .map_err(|e| BrokerError::Auth(format!("{:#}", e)))?;
        self.store(key, &token).await;
        Ok(token.access_token)
    }
}
