use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use log::{debug, info, LevelFilter};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::store::DEFAULT_RECORD_SIZE;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BusConfig {
    pub path: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            path: "/sys/bus/w1/devices".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub file: String,
    pub record_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file: "station.nvs".to_string(),
            record_size: DEFAULT_RECORD_SIZE,
        }
    }
}

/// Task intervals in seconds, except the loop tick in milliseconds.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IntervalConfig {
    pub tick_ms: u64,
    pub temperature: u64,
    pub level: u64,
    pub display: u64,
    pub publish: u64,
    /// 0 disables periodic bus rescans.
    pub rescan: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            temperature: 10,
            level: 10,
            display: 5,
            publish: 10,
            rescan: 0,
        }
    }
}

impl IntervalConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub file: String,
    pub save_to_file: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            file: "panel.txt".to_string(),
            save_to_file: false,
        }
    }
}

/// Published topics end in `temperature` for every sensor unless
/// `per_measurement` is set.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TopicConfig {
    pub per_measurement: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bus: BusConfig,
    pub storage: StorageConfig,
    pub intervals: IntervalConfig,
    pub display: DisplayConfig,
    pub topics: TopicConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        Self::from_file("config.ini")
    }

    pub fn get_log_level(&self) -> LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info, // Default to Info if invalid
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        debug!("Loading configuration from {}", config_path.display());

        let config = Config::builder()
            .add_source(File::from(config_path).format(FileFormat::Ini))
            .build()
            .context(format!("Failed to load config from {}", config_path.display()))?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize config")?;

        Ok(app_config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_path = path.as_ref();

        let mut config_str = String::new();

        config_str.push_str(&format!("[bus]\npath = {}\n\n", self.bus.path));

        config_str.push_str(&format!(
            "[storage]\nfile = {}\nrecord_size = {}\n\n",
            self.storage.file, self.storage.record_size
        ));

        config_str.push_str(&format!(
            "[intervals]\ntick_ms = {}\ntemperature = {}\nlevel = {}\ndisplay = {}\npublish = {}\nrescan = {}\n\n",
            self.intervals.tick_ms,
            self.intervals.temperature,
            self.intervals.level,
            self.intervals.display,
            self.intervals.publish,
            self.intervals.rescan
        ));

        config_str.push_str(&format!(
            "[display]\nfile = {}\nsave_to_file = {}\n\n",
            self.display.file, self.display.save_to_file
        ));

        config_str.push_str(&format!(
            "[topics]\nper_measurement = {}\n\n",
            self.topics.per_measurement
        ));

        config_str.push_str(&format!("[logging]\nlevel = {}\n", self.logging.level));

        fs::write(config_path, config_str)
            .context(format!("Failed to save config to {}", config_path.display()))?;

        info!("Configuration saved to {}", config_path.display());
        Ok(())
    }
}
