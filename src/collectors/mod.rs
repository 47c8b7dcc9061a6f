pub mod w1;

use crate::models::{DeviceAddress, SensorType};
use std::io;
use thiserror::Error;

pub use w1::W1SysfsBus;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CRC check failed for {0}")]
    CrcCheckFailed(String),

    #[error("unexpected reading from {device}: {detail}")]
    Malformed { device: String, detail: String },

    #[error("{0:?} sensors cannot be read")]
    Unsupported(SensorType),
}

/// The 1-Wire bus as seen by the station: discovery plus raw reads.
pub trait OneWireBus {
    /// ROM codes of every device currently on the bus.
    fn discover(&mut self) -> Result<Vec<DeviceAddress>, BusError>;

    /// Raw measurement: degrees Celsius for temperature probes, volts for battery
    /// monitors.
    fn read_raw_value(
        &mut self,
        device: &DeviceAddress,
        sensor_type: SensorType,
    ) -> Result<f32, BusError>;
}
