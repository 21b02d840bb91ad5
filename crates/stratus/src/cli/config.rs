//! Config discovery.
//!
//! Precedence, lowest first: built-in defaults, `$STRATUS_HOME/config.toml`
//! (or the file named by `--config`), then command line flags.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use stratus_broker::BrokerConfig;

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Flag values that override the loaded file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub default_resource_group: Option<String>,
    pub default_location: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub unbind_tolerates_missing_api: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut BrokerConfig) {
        if let Some(group) = &self.default_resource_group {
            config.default_resource_group = group.clone();
        }
        if let Some(location) = &self.default_location {
            config.default_location = location.clone();
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if self.unbind_tolerates_missing_api {
            config.unbind_tolerates_missing_api = true;
        }
    }
}

/// Default config location, if the home directory can be resolved.
pub fn default_config_path() -> Option<PathBuf> {
    stratus_logging::stratus_home()
        .ok()
        .map(|home| home.join(CONFIG_FILE_NAME))
}

/// Load the effective config.
///
/// An explicit path must exist; the default location is optional.
pub fn load_config(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<BrokerConfig> {
    let mut config = match explicit {
        Some(path) => BrokerConfig::load(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => BrokerConfig::load(&path)?,
            _ => BrokerConfig::default(),
        },
    };

    overrides.apply(&mut config);
    config
        .validate()
        .context("Config rejected after applying command line overrides")?;
    Ok(config)
}
