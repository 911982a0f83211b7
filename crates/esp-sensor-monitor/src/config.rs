/*
[INPUT]:  YAML configuration file (optional) and CLI overrides
[OUTPUT]: Parsed monitor configuration and derived feed/device settings
[POS]:    Configuration layer - startup settings
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use esp_sensor_feed::device::{DEFAULT_COUNTER_INTERVAL, DEFAULT_DEVICE_BIND, DEFAULT_MAX_CLIENTS};
use esp_sensor_feed::{DEFAULT_FEED_URL, DeviceConfig, FeedConfig};

const CONFIG_DIR_NAME: &str = "esp-sensor-monitor";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Top-level configuration for the monitor
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Connection to the sensor device
    #[serde(default)]
    pub feed: FeedSection,
    /// Emulated device served by `emulate`
    #[serde(default)]
    pub device: DeviceSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedSection {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceSection {
    #[serde(default = "default_device_bind")]
    pub bind: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            bind: default_device_bind(),
            interval_ms: default_interval_ms(),
            max_clients: default_max_clients(),
        }
    }
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_channel_capacity() -> usize {
    100
}

fn default_device_bind() -> String {
    DEFAULT_DEVICE_BIND.to_string()
}

fn default_interval_ms() -> u64 {
    DEFAULT_COUNTER_INTERVAL.as_millis() as u64
}

fn default_max_clients() -> usize {
    DEFAULT_MAX_CLIENTS
}

/// `<config dir>/esp-sensor-monitor/config.yaml`, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit path, or the default path when it exists, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.feed.url.trim().is_empty() {
            bail!("feed.url must not be empty");
        }
        if self.feed.connect_timeout_secs == 0 {
            bail!("feed.connect_timeout_secs must be greater than zero");
        }
        if self.feed.channel_capacity == 0 {
            bail!("feed.channel_capacity must be greater than zero");
        }
        if self.device.interval_ms == 0 {
            bail!("device.interval_ms must be greater than zero");
        }
        if self.device.max_clients == 0 {
            bail!("device.max_clients must be greater than zero");
        }
        Ok(())
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            url: self.feed.url.clone(),
            connect_timeout: Duration::from_secs(self.feed.connect_timeout_secs),
            channel_capacity: self.feed.channel_capacity,
        }
    }

    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            bind: self.device.bind.clone(),
            interval: Duration::from_millis(self.device.interval_ms),
            max_clients: self.device.max_clients,
        }
    }
}
