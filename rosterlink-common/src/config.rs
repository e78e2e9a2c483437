//! Configuration loading for rosterlink
//!
//! Per-key resolution priority: environment variable → TOML file → compiled
//! default. The directory URL and API token have no defaults and must be
//! supplied by one of the two sources.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default batch window size for demand-driven existence checks
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Default per-request timeout for directory API calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ENV_DIRECTORY_URL: &str = "ROSTERLINK_DIRECTORY_URL";
const ENV_API_TOKEN: &str = "ROSTERLINK_API_TOKEN";
const ENV_BATCH_SIZE: &str = "ROSTERLINK_BATCH_SIZE";
const ENV_REQUEST_TIMEOUT_SECS: &str = "ROSTERLINK_REQUEST_TIMEOUT_SECS";

/// Raw TOML configuration file contents
///
/// All fields optional; resolution into a [`ReconConfig`] applies environment
/// overrides and defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the person-directory API (e.g. `https://rock.example.org/api`)
    pub directory_url: Option<String>,
    /// Static token sent as the `Authorization-Token` header on every call
    pub api_token: Option<String>,
    /// Existence checks issued per demand signal
    pub batch_size: Option<usize>,
    /// Per-request timeout for directory calls (seconds)
    pub request_timeout_secs: Option<u64>,
}

/// Fully resolved reconciliation configuration
#[derive(Debug, Clone)]
pub struct ReconConfig {
    pub directory_url: String,
    pub api_token: String,
    pub batch_size: usize,
    pub request_timeout_secs: u64,
}

/// Default configuration file path for the platform
///
/// `~/.config/rosterlink/config.toml` on Linux (XDG), the platform config
/// directory elsewhere.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("rosterlink").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load a TOML configuration file
///
/// A missing file is not an error: all keys may come from the environment.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        info!("Config file not found at {}, using environment/defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    info!("Configuration loaded from {}", path.display());
    Ok(config)
}

/// Write a TOML configuration file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    std::fs::write(path, content)?;
    Ok(())
}

impl ReconConfig {
    /// Resolve the effective configuration from a TOML file plus environment
    ///
    /// Warns when a key is present in both sources (potential misconfiguration);
    /// the environment wins.
    pub fn resolve(toml_config: &TomlConfig) -> Result<Self> {
        let directory_url = resolve_string(
            ENV_DIRECTORY_URL,
            toml_config.directory_url.as_deref(),
            "directory_url",
        )
        .ok_or_else(|| {
            Error::Config(format!(
                "Directory URL not configured. Set {} or directory_url in the config file.",
                ENV_DIRECTORY_URL
            ))
        })?;

        let api_token = resolve_string(ENV_API_TOKEN, toml_config.api_token.as_deref(), "api_token")
            .ok_or_else(|| {
                Error::Config(format!(
                    "Directory API token not configured. Set {} or api_token in the config file.",
                    ENV_API_TOKEN
                ))
            })?;

        let batch_size = match resolve_string(
            ENV_BATCH_SIZE,
            toml_config.batch_size.map(|v| v.to_string()).as_deref(),
            "batch_size",
        ) {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("Invalid batch_size: {}", raw)))?,
            None => DEFAULT_BATCH_SIZE,
        };
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }

        let request_timeout_secs = match resolve_string(
            ENV_REQUEST_TIMEOUT_SECS,
            toml_config
                .request_timeout_secs
                .map(|v| v.to_string())
                .as_deref(),
            "request_timeout_secs",
        ) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("Invalid request_timeout_secs: {}", raw)))?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            directory_url: directory_url.trim_end_matches('/').to_string(),
            api_token,
            batch_size,
            request_timeout_secs,
        })
    }

    /// Load and resolve from the default config path
    pub fn load_default() -> Result<Self> {
        let path = default_config_path()?;
        let toml_config = load_toml_config(&path)?;
        Self::resolve(&toml_config)
    }
}

/// Resolve one string key with ENV > TOML priority
fn resolve_string(env_name: &str, toml_value: Option<&str>, key: &str) -> Option<String> {
    let env_value = std::env::var(env_name).ok().filter(|v| !v.trim().is_empty());
    let toml_value = toml_value.map(str::to_string).filter(|v| !v.trim().is_empty());

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment and TOML config. Using environment (highest priority).",
            key
        );
    }

    env_value.or(toml_value)
}
