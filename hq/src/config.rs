//! hookqueue configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::CoordinatorConfig;

/// Main hookqueue configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Webhook sender configuration
    pub sender: SenderConfig,

    /// Connectivity detection
    pub connectivity: ConnectivityConfig,

    /// Delivery coordinator tuning
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .hookqueue.yml
        let local_config = PathBuf::from(".hookqueue.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/hookqueue/hookqueue.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hookqueue").join("hookqueue.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed; the full load later reports them.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the queue and the endpoint
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/hookqueue on Linux)
        let path = dirs::data_dir()
            .map(|d| d.join("hookqueue"))
            .unwrap_or_else(|| PathBuf::from(".hookqueue"))
            .join("queue.db");

        Self { path }
    }
}

/// Webhook sender configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// User-Agent header sent with each delivery
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: format!("hookqueue/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl SenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// How connectivity is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivityMode {
    /// Poll a TCP endpoint
    Probe,
    /// Always assume the network is usable
    Online,
}

/// Connectivity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub mode: ConnectivityMode,

    /// host:port to open a TCP connection to
    #[serde(rename = "probe-addr")]
    pub probe_addr: String,

    /// Connect timeout for one probe in milliseconds
    #[serde(rename = "probe-timeout-ms")]
    pub probe_timeout_ms: u64,

    /// Delay between probes in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            mode: ConnectivityMode::Probe,
            probe_addr: "1.1.1.1:443".to_string(),
            probe_timeout_ms: 3_000,
            poll_interval_ms: 5_000,
        }
    }
}

impl ConnectivityConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
