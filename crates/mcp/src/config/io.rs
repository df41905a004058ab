//! Configuration IO helpers.

use crate::config::{ConfigError, GatewayConfig, validate_config};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use wfgate_util::expand_tilde;

pub const CONFIG_PATH_ENV: &str = "WFGATE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Returns the configuration path used when no `--config` flag is given.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Loads, parses and validates the configuration at `path`.
pub fn load_config_from_path(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_config(&config)?;
    debug!(path = %path.display(), workflows = config.workflows.len(), "loaded configuration");
    Ok(config)
}

/// Parses YAML without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(GatewayConfig::default());
    }
    serde_yaml::from_str(content)
}
