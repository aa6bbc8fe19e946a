//! Discovery configuration and its on-disk store.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::ConfigError;
use crate::protocol::DISCOVERY_PORT;

/// Product identity accepted when nothing else is configured.
pub const DEFAULT_PRODUCT_IDENTITY: &str = "J1";

/// Seconds between periodic probe rounds.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 10;

/// Largest payload an IPv4 UDP datagram can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Longest reply accepted; anything larger is dropped rather than truncated.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = MAX_UDP_PAYLOAD;

const CONFIG_FILE_NAME: &str = "config.json";

/// How discovery sockets pick their local port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindMode {
    /// Explicit ports on Windows, ephemeral elsewhere
    #[default]
    Auto,
    /// Consecutive ports starting at the discovery port
    Explicit,
    /// Let the OS choose a port per address
    Ephemeral,
}

impl BindMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindMode::Auto => "auto",
            BindMode::Explicit => "explicit",
            BindMode::Ephemeral => "ephemeral",
        }
    }
}

/// Settings for one discovery engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryConfig {
    /// Port probes are sent to
    pub discovery_port: u16,
    /// Seconds between periodic rounds
    pub probe_interval_secs: u64,
    /// Required value of the `model` property
    pub product_identity: String,
    pub bind_mode: BindMode,
    pub max_datagram_size: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discovery_port: DISCOVERY_PORT,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            product_identity: DEFAULT_PRODUCT_IDENTITY.to_string(),
            bind_mode: BindMode::Auto,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
        }
    }
}

impl DiscoveryConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery_port == 0 {
            return Err(ConfigError::Invalid(
                "discovery port must be non-zero".to_string(),
            ));
        }
        if self.probe_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe interval must be at least one second".to_string(),
            ));
        }
        if self.product_identity.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "product identity cannot be empty".to_string(),
            ));
        }
        if !(64..=MAX_UDP_PAYLOAD).contains(&self.max_datagram_size) {
            return Err(ConfigError::Invalid(format!(
                "max datagram size {} must be between 64 and {}",
                self.max_datagram_size, MAX_UDP_PAYLOAD
            )));
        }
        Ok(())
    }
}

/// Get the default data directory for printscan.
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "printscan", "printscan")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// JSON file store for [`DiscoveryConfig`].
///
/// Takes the directory in the constructor so tests and the CLI can point it
/// anywhere.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: PathBuf) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(CONFIG_FILE_NAME),
        })
    }

    /// Store in the platform config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        let dir = default_data_dir().ok_or(ConfigError::NoDataDir)?;
        Self::new(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved config, or defaults if nothing was saved yet.
    pub async fn load(&self) -> Result<DiscoveryConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(DiscoveryConfig::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        let config: DiscoveryConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    pub async fn save(&self, config: &DiscoveryConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content).await?;

        Ok(())
    }

    /// Remove the saved config so defaults apply again.
    pub async fn reset(&self) -> Result<(), ConfigError> {
        if self.path.exists() {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}
