//! Configuration management for TenderDesk
//!
//! This crate handles loading and validating `.tenderdesk/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tender_common::{Result, TenderError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace root path (set programmatically, not in TOML)
    #[serde(skip)]
    pub root: PathBuf,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Realtime connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Sync behavior settings
    #[serde(default)]
    pub sync: SyncBehaviorConfig,
}

/// Storage configuration ([storage])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for cached documents and queued changes, relative to
    /// the workspace root
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

fn default_storage_dir() -> String {
    ".tenderdesk/sync".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

/// Connection configuration ([connection])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base reconnect delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Automatic reconnect attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Reconciliation poll interval in seconds (safety net for missed
    /// transport signals)
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    16_000
}
fn default_max_attempts() -> u32 {
    5
}
fn default_reconcile_interval_secs() -> u64 {
    5
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

/// Sync behavior configuration ([sync])
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBehaviorConfig {
    /// Queue edits even while connected. When false, edits made online
    /// are only cached locally and the server write path is assumed to
    /// have applied them directly.
    #[serde(default)]
    pub queue_while_online: bool,
}

impl Default for SyncBehaviorConfig {
    fn default() -> Self {
        Self {
            queue_while_online: false,
        }
    }
}

impl Config {
    /// Load configuration from workspace root
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(".tenderdesk/config.toml");

        if !config_path.exists() {
            return Ok(Self {
                root: workspace_root.to_path_buf(),
                storage: StorageConfig::default(),
                connection: ConnectionConfig::default(),
                sync: SyncBehaviorConfig::default(),
            });
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| TenderError::ConfigError(format!("Failed to read config: {}", e)))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| TenderError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.root = workspace_root.to_path_buf();
        Ok(config)
    }

    /// Absolute path to the durable storage directory
    pub fn storage_dir(&self) -> PathBuf {
        self.root.join(&self.storage.dir)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.dir.is_empty() {
            anyhow::bail!("storage.dir cannot be empty");
        }
        if self.connection.max_attempts == 0 {
            anyhow::bail!("connection.max_attempts must be at least 1");
        }
        if self.connection.base_delay_ms == 0 {
            anyhow::bail!("connection.base_delay_ms must be nonzero");
        }
        if self.connection.base_delay_ms > self.connection.max_delay_ms {
            anyhow::bail!("connection.base_delay_ms cannot exceed connection.max_delay_ms");
        }
        Ok(())
    }
}
