use crate::models::address::{DeviceAddress, SensorAddress};
use serde::{Deserialize, Serialize};

/// Maximum characters kept for a sensor display name.
pub const NAME_CAPACITY: usize = 20;
/// Maximum characters kept for a format template.
pub const FORMAT_CAPACITY: usize = 10;
/// Maximum characters kept for a breakpoint string.
pub const BONDS_CAPACITY: usize = 59;
/// Highest number of fractional digits rendered.
pub const MAX_PRECISION: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorType {
    /// DS18B20, DS18S20 and DS1822 probes.
    Temperature,
    /// DS2438 smart battery monitor, used for level measurement.
    BatteryMonitor,
    Unknown,
}

impl SensorType {
    /// Single character tag shown on the status page.
    pub fn code(self) -> char {
        match self {
            Self::Temperature => 't',
            Self::BatteryMonitor => 'b',
            Self::Unknown => 'u',
        }
    }

    /// What the device measures, `None` for unknown devices.
    pub fn measurement(self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("temperature"),
            Self::BatteryMonitor => Some("level"),
            Self::Unknown => None,
        }
    }
}

/// Per-sensor display configuration.
///
/// A bound of `None` means "not configured". Bounds loaded from older records
/// may still carry negative numbers, which the transform treats the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub name: String,
    /// printf-style template with a single `%s`, `%%` renders a literal percent sign.
    pub format: String,
    pub format_min: Option<f32>,
    pub format_max: Option<f32>,
    pub precision: u8,
    pub min: Option<f32>,
    pub max: Option<f32>,
    /// Breakpoints as `raw=display` pairs separated by `;`.
    pub bonds: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            format: "%s".to_string(),
            format_min: None,
            format_max: None,
            precision: 0,
            min: None,
            max: None,
            bonds: String::new(),
        }
    }
}

/// Maps a legacy `-1` style sentinel to an unset bound.
pub fn bound_from_legacy(value: f32) -> Option<f32> {
    if value < 0.0 || value.is_nan() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub address: SensorAddress,
    pub device_address: DeviceAddress,
    pub sensor_type: SensorType,
    pub config: SensorConfig,
    /// Latest raw reading, `None` until the first successful sample.
    pub value: Option<f32>,
}

impl Sensor {
    pub fn new(device_address: DeviceAddress, sensor_type: SensorType) -> Self {
        Self {
            address: device_address.to_sensor_address(),
            device_address,
            sensor_type,
            config: SensorConfig::default(),
            value: None,
        }
    }

    pub fn with_config(mut self, config: SensorConfig) -> Self {
        self.config = config;
        self
    }

    /// Configured name, falling back to the address.
    pub fn label(&self) -> &str {
        if self.config.name.is_empty() {
            self.address.as_str()
        } else {
            &self.config.name
        }
    }
}
