use crate::models::{Sensor, SensorAddress, SensorType};
use crate::transform::{render_number, scale};
use log::info;

/// Messaging collaborator. Connection handling is the implementor's business.
pub trait Publisher {
    /// Returns `false` when the message could not be handed over.
    fn publish(&mut self, topic: &str, payload: &str) -> bool;
}

/// Last topic level used for every reading unless per-measurement topics are
/// enabled.
pub const DEFAULT_MEASUREMENT: &str = "temperature";

/// `sensor/<address>/temperature`, `None` for sensors of unknown type.
///
/// With `per_measurement` the last level names what the device measures, so
/// battery monitors publish to `sensor/<address>/level`.
pub fn topic(
    address: &SensorAddress,
    sensor_type: SensorType,
    per_measurement: bool,
) -> Option<String> {
    let measurement = sensor_type.measurement()?;
    let measurement = if per_measurement {
        measurement
    } else {
        DEFAULT_MEASUREMENT
    };
    Some(format!("sensor/{}/{}", address, measurement))
}

/// Scaled value with the sensor's precision, without the display template.
pub fn payload(sensor: &Sensor) -> Option<String> {
    let raw = sensor.value?;
    let scaled = scale(raw, &sensor.config);
    Some(render_number(scaled.value, sensor.config.precision))
}

/// Topic and payload for every sensor that has something to publish.
pub fn messages(sensors: &[Sensor], per_measurement: bool) -> Vec<(String, String)> {
    sensors
        .iter()
        .filter_map(|sensor| {
            let sensor_topic = topic(&sensor.address, sensor.sensor_type, per_measurement)?;
            Some((sensor_topic, payload(sensor)?))
        })
        .collect()
}

/// Publisher that only writes messages to the log.
#[derive(Debug, Default)]
pub struct LogPublisher {
    pub published: usize,
}

impl Publisher for LogPublisher {
    fn publish(&mut self, topic: &str, payload: &str) -> bool {
        info!("topic: {} - payload: {}", topic, payload);
        self.published += 1;
        true
    }
}
