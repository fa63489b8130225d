//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `farescan.toml` when present and deserializes into strongly-typed
//! structs; every field has a default so the file is optional. Secrets
//! (API key and secret) are referenced by env-var name in the config and
//! resolved at runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "farescan.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub amadeus: AmadeusConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of departure dates to scan when `--days` is not given.
    pub default_days: u32,
    /// Pause between consecutive date queries (milliseconds).
    pub request_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            default_days: 60,
            request_delay_ms: 0,
        }
    }
}

impl ScanConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AmadeusConfig {
    /// API host; the test environment is free but serves cached data.
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub timeout_secs: u64,
}

impl Default for AmadeusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://test.api.amadeus.com".to_string(),
            api_key_env: "AMADEUS_API_KEY".to_string(),
            api_secret_env: "AMADEUS_API_SECRET".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AmadeusConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows shown in the ranked table.
    pub limit: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
