//! Broker configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! default_resource_group = "brokered"
//! default_location = "westeurope"
//! publisher_email = "ops@example.com"
//! unbind_tolerates_missing_api = false
//!
//! [catalog]
//! id = "..."
//! name = "azure-apimanagement"
//! plans = [{ id = "...", name = "Standard" }]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stratus_protocol::defaults::{
    DEFAULT_EXISTING_SKU, DEFAULT_LOCATION, DEFAULT_PUBLISHER_EMAIL, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RESOURCE_GROUP,
};
use stratus_protocol::ServiceCatalog;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Last-resort resource group when the request names none
    pub default_resource_group: String,
    /// Location used when neither parameters nor credentials name one
    pub default_location: String,
    /// Publisher email written into synthesized instance documents
    pub publisher_email: String,
    /// SKU written into synthesized documents for the "Existing" plan
    pub existing_plan_sku: String,
    /// Per-request timeout for resource manager calls
    pub request_timeout_secs: u64,
    /// Treat a 404 on API delete as success during unbind
    pub unbind_tolerates_missing_api: bool,
    pub catalog: ServiceCatalog,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            default_resource_group: DEFAULT_RESOURCE_GROUP.to_string(),
            default_location: DEFAULT_LOCATION.to_string(),
            publisher_email: DEFAULT_PUBLISHER_EMAIL.to_string(),
            existing_plan_sku: DEFAULT_EXISTING_SKU.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            unbind_tolerates_missing_api: false,
            catalog: ServiceCatalog::default(),
        }
    }
}

impl BrokerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BrokerConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_resource_group.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_resource_group must not be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.catalog.plans().is_empty() {
            return Err(ConfigError::Invalid("catalog has no plans".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
