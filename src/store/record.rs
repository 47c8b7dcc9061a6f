use crate::models::{SensorAddress, SensorConfig};
use serde::{Deserialize, Serialize};

/// Number of per-sensor configuration slots in a record.
pub const SENSOR_CONFIG_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    pub server: String,
    pub port: u16,
    pub client_name: String,
    pub user: String,
    pub password: String,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            server: String::new(),
            port: 1883,
            client_name: "OneWireStation".to_string(),
            user: String::new(),
            password: String::new(),
        }
    }
}

/// One `(address, config)` pair of the sensor table. An empty address marks a
/// free slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSlot {
    pub address: String,
    pub config: SensorConfig,
}

impl SensorSlot {
    pub fn is_free(&self) -> bool {
        self.address.is_empty()
    }
}

/// The user editable configuration persisted to non-volatile storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRecord {
    pub wifi: WifiCredentials,
    pub mqtt: MqttSettings,
    pub sensors: Vec<SensorSlot>,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            wifi: WifiCredentials::default(),
            mqtt: MqttSettings::default(),
            sensors: vec![SensorSlot::default(); SENSOR_CONFIG_COUNT],
        }
    }
}

impl ConfigRecord {
    /// First slot whose address matches exactly.
    pub fn lookup_sensor_config(&self, address: &str) -> Option<&SensorConfig> {
        self.sensors
            .iter()
            .find(|slot| !slot.is_free() && slot.address == address)
            .map(|slot| &slot.config)
    }

    /// Copy a stored record into this one field by field.
    ///
    /// The sensor table keeps its fixed size: surplus stored slots are dropped and
    /// slots missing from the stored record keep their current contents.
    pub fn copy_fields_from(&mut self, stored: ConfigRecord) {
        self.wifi.ssid = stored.wifi.ssid;
        self.wifi.password = stored.wifi.password;

        self.mqtt.server = stored.mqtt.server;
        self.mqtt.port = stored.mqtt.port;
        self.mqtt.client_name = stored.mqtt.client_name;
        self.mqtt.user = stored.mqtt.user;
        self.mqtt.password = stored.mqtt.password;

        self.sensors.resize(SENSOR_CONFIG_COUNT, SensorSlot::default());
        for (slot, stored_slot) in self.sensors.iter_mut().zip(stored.sensors) {
            slot.address = stored_slot.address;
            slot.config.name = stored_slot.config.name;
            slot.config.format = stored_slot.config.format;
            slot.config.format_min = stored_slot.config.format_min;
            slot.config.format_max = stored_slot.config.format_max;
            slot.config.precision = stored_slot.config.precision;
            slot.config.min = stored_slot.config.min;
            slot.config.max = stored_slot.config.max;
            slot.config.bonds = stored_slot.config.bonds;
        }
    }

    /// The sensor table as the config form lists it: the stored slots, with
    /// `addresses` that have no slot yet shown in free slots, in order.
    /// Addresses that do not fit are left out. The record itself is unchanged.
    pub fn form_slots<'a, I>(&self, addresses: I) -> Vec<SensorSlot>
    where
        I: IntoIterator<Item = &'a SensorAddress>,
    {
        let mut slots = self.sensors.clone();
        for address in addresses {
            if self.lookup_sensor_config(address.as_str()).is_some() {
                continue;
            }
            match slots.iter_mut().find(|slot| slot.is_free()) {
                Some(slot) => {
                    slot.address = address.to_string();
                    slot.config = SensorConfig::default();
                }
                None => break,
            }
        }
        slots
    }
}
