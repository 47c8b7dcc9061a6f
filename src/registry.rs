use crate::models::{Sensor, SensorConfig, SensorType};
use crate::store::ConfigRecord;
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("sensor {0} is already registered")]
    DuplicateAddress(String),
}

/// Ordered list of the sensors found on the bus.
///
/// Entries stay contiguous and keep their discovery order; each address appears
/// at most once.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    sensors: Vec<Sensor>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sensor> {
        self.sensors.iter()
    }

    pub fn get(&self, address: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.address == address)
    }

    /// Sensors of one type, in registry order.
    pub fn of_type(&self, sensor_type: SensorType) -> impl Iterator<Item = &Sensor> {
        self.sensors
            .iter()
            .filter(move |s| s.sensor_type == sensor_type)
    }

    /// Append a sensor. A second sensor with an address already present is rejected.
    pub fn add_sensor(&mut self, sensor: Sensor) -> Result<(), RegistryError> {
        if self.get(sensor.address.as_str()).is_some() {
            return Err(RegistryError::DuplicateAddress(sensor.address.to_string()));
        }
        debug!(
            "Registered sensor {} ({:?})",
            sensor.address, sensor.sensor_type
        );
        self.sensors.push(sensor);
        Ok(())
    }

    /// Store a new raw value. Returns `false` when no sensor has `address`.
    pub fn update_value(&mut self, address: &str, value: f32) -> bool {
        match self.sensors.iter_mut().find(|s| s.address == address) {
            Some(sensor) => {
                sensor.value = Some(value);
                true
            }
            None => {
                warn!("Value for unregistered sensor {}", address);
                false
            }
        }
    }

    /// Remove the sensor with `address`, keeping the order of the others.
    pub fn remove_sensor(&mut self, address: &str) -> Option<Sensor> {
        let index = self.sensors.iter().position(|s| s.address == address)?;
        Some(self.sensors.remove(index))
    }

    pub fn clear(&mut self) {
        self.sensors.clear();
    }

    /// Re-attach display configuration after the record changed.
    pub fn resolve_configs(&mut self, record: &ConfigRecord) {
        for sensor in &mut self.sensors {
            sensor.config = record
                .lookup_sensor_config(sensor.address.as_str())
                .cloned()
                .unwrap_or_else(SensorConfig::default);
        }
    }
}

impl<'a> IntoIterator for &'a SensorRegistry {
    type Item = &'a Sensor;
    type IntoIter = std::slice::Iter<'a, Sensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.sensors.iter()
    }
}
