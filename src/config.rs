//! Persistent driver configuration
//!
//! Stored as TOML under the user's config directory. Every field has a
//! default, so a partial file (or none at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cwc_robots::{ConnectionSettings, Family};
use serde::{Deserialize, Serialize};

fn default_reconnect_interval_ms() -> u64 {
    5000
}
fn default_ble_scan_ms() -> u64 {
    4000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Robot used when a command omits one
    #[serde(default)]
    pub default_robot: Option<Family>,
    /// Serial or RFCOMM device used instead of auto-discovery
    #[serde(default)]
    pub serial_port: Option<String>,
    /// Serial speed override; each robot otherwise uses its own
    #[serde(default)]
    pub baud_rate: Option<u32>,
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// How long a BLE scan listens for advertisements
    #[serde(default = "default_ble_scan_ms")]
    pub ble_scan_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_robot: None,
            serial_port: None,
            baud_rate: None,
            reconnect_interval_ms: default_reconnect_interval_ms(),
            ble_scan_ms: default_ble_scan_ms(),
            log_level: default_log_level(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cwc-driver")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn baud_rate_for(&self, robot_default: u32) -> u32 {
        self.baud_rate.unwrap_or(robot_default)
    }

    pub fn ble_scan(&self) -> Duration {
        Duration::from_millis(self.ble_scan_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connection_settings(&self, monitor: bool) -> ConnectionSettings {
        ConnectionSettings {
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            connect_timeout: self.connect_timeout(),
            monitor,
        }
    }
}
