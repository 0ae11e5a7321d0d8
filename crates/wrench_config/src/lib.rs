//! Configuration management for Wrench
//!
//! This crate handles loading `.wrench/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wrench_common::{Result, WrenchError};

/// Workspace-relative location of the config file
pub const CONFIG_PATH: &str = ".wrench/config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root path (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Persistence settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Retry/backoff settings
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Storage configuration ([storage])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persisted lists, relative to the workspace root
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    #[serde(default = "default_conflict_key")]
    pub conflict_key: String,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from(".wrench/queue")
}
fn default_queue_key() -> String {
    "offline-queue".to_string()
}
fn default_conflict_key() -> String {
    "offline-conflicts".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            queue_key: default_queue_key(),
            conflict_key: default_conflict_key(),
        }
    }
}

/// Server configuration ([server])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retry configuration ([retry])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Failures allowed before a mutation is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_delay_ms() -> u64 {
    300_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `workspace_root`
    pub fn with_root(workspace_root: &Path) -> Self {
        Self {
            root: workspace_root.to_path_buf(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_PATH);

        if !config_path.exists() {
            return Ok(Self::with_root(workspace_root));
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| WrenchError::ConfigError(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| WrenchError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.root = workspace_root.to_path_buf();
        Ok(config)
    }

    /// Absolute storage directory
    pub fn storage_dir(&self) -> PathBuf {
        if self.storage.dir.is_absolute() {
            self.storage.dir.clone()
        } else {
            self.root.join(&self.storage.dir)
        }
    }

    /// Render the config as TOML, used by `wrench init`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| WrenchError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
