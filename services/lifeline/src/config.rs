//! Configuration types for the lifeline service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

impl Config {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.connectivity.probe_interval_seconds == 0 {
            return Err(crate::LifelineError::Config(
                "connectivity.probe_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.backend.request_timeout_seconds == 0 {
            return Err(crate::LifelineError::Config(
                "backend.request_timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the backend lives and how it is probed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_probe_path")]
    pub probe_path: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            probe_path: default_probe_path(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Connectivity monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_interval")]
    pub probe_interval_seconds: u64,
    /// Serve fallback data even when the backend is reachable
    #[serde(default)]
    pub force_fallback: bool,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: default_probe_interval(),
            force_fallback: false,
        }
    }
}

/// Fallback data and substitution reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Fixture file replacing the bundled fixtures
    #[serde(default)]
    pub fixtures_path: Option<PathBuf>,
    /// Log substitutions at warn level instead of debug
    #[serde(default)]
    pub report_degraded_usage: bool,
    #[serde(default = "default_content_type")]
    pub expected_content_type: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            fixtures_path: None,
            report_degraded_usage: false,
            expected_content_type: default_content_type(),
        }
    }
}

/// Status/retry HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_status_port")]
    pub port: u16,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_status_port(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_probe_path() -> String {
    "/".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_probe_interval() -> u64 {
    30
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_status_port() -> u16 {
    11120
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::LifelineError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
