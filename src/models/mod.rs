pub mod address;
pub mod sensor;

pub use address::{DeviceAddress, SensorAddress};
pub use sensor::{Sensor, SensorConfig, SensorType};
