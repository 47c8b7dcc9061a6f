use anyhow::Context;
use log::{debug, error, info, warn};

use crate::collectors::{BusError, OneWireBus};
use crate::config::IntervalConfig;
use crate::dashboard::{self, Panel};
use crate::form::{self, FormSummary};
use crate::identity::classify;
use crate::models::{DeviceAddress, Sensor, SensorAddress, SensorType};
use crate::publish::{self, Publisher};
use crate::registry::SensorRegistry;
use crate::store::{ConfigRecord, ConfigStore, NvStorage, SensorSlot};

/// Self-gating timer on a monotonic millisecond clock.
///
/// A gate that never fired is due immediately; a zero interval never fires.
#[derive(Debug, Clone)]
pub struct Gate {
    interval_ms: u64,
    last_ms: Option<u64>,
}

impl Gate {
    pub fn every_secs(secs: u64) -> Self {
        Self::every_ms(secs.saturating_mul(1000))
    }

    pub fn every_ms(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    pub fn disabled() -> Self {
        Self::every_ms(0)
    }

    /// True when the interval elapsed; the gate then restarts from `now_ms`.
    pub fn is_due(&mut self, now_ms: u64) -> bool {
        if self.interval_ms == 0 {
            return false;
        }
        let due = match self.last_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if due {
            self.last_ms = Some(now_ms);
        }
        due
    }
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub rescan: Gate,
    pub temperature: Gate,
    pub level: Gate,
    pub display: Gate,
    pub publish: Gate,
}

impl From<&IntervalConfig> for Schedule {
    fn from(intervals: &IntervalConfig) -> Self {
        Self {
            rescan: Gate::every_secs(intervals.rescan),
            temperature: Gate::every_secs(intervals.temperature),
            level: Gate::every_secs(intervals.level),
            display: Gate::every_secs(intervals.display),
            publish: Gate::every_secs(intervals.publish),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from(&IntervalConfig::default())
    }
}

/// Owns the live configuration record and the sensor registry and drives the
/// periodic tasks against the bus, storage, messaging and panel collaborators.
pub struct Station<B, S, P, D>
where
    B: OneWireBus,
    S: NvStorage,
    P: Publisher,
    D: Panel,
{
    config: ConfigRecord,
    registry: SensorRegistry,
    store: ConfigStore<S>,
    bus: B,
    publisher: P,
    panel: D,
    schedule: Schedule,
    measurement_topics: bool,
}

impl<B, S, P, D> Station<B, S, P, D>
where
    B: OneWireBus,
    S: NvStorage,
    P: Publisher,
    D: Panel,
{
    pub fn new(bus: B, store: ConfigStore<S>, publisher: P, panel: D, schedule: Schedule) -> Self {
        Self {
            config: ConfigRecord::default(),
            registry: SensorRegistry::new(),
            store,
            bus,
            publisher,
            panel,
            schedule,
            measurement_topics: false,
        }
    }

    /// Publish battery monitors under `level` instead of `temperature`.
    pub fn with_measurement_topics(mut self, enabled: bool) -> Self {
        self.measurement_topics = enabled;
        self
    }

    pub fn config(&self) -> &ConfigRecord {
        &self.config
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn panel(&self) -> &D {
        &self.panel
    }

    /// Load the stored configuration (keeping defaults when it is rejected) and
    /// discover the bus.
    pub fn start(&mut self) -> Result<usize, BusError> {
        if self.store.load_into(&mut self.config).is_err() {
            info!("Using default configuration");
        }
        self.rescan()
    }

    /// Rebuild the registry from a fresh bus discovery.
    pub fn rescan(&mut self) -> Result<usize, BusError> {
        let found = self.bus.discover()?;
        self.registry.clear();

        for device in found {
            let sensor = self.new_sensor(device);
            if let Err(e) = self.registry.add_sensor(sensor) {
                warn!("Skipping device: {}", e);
            }
        }

        info!("Found {} 1-Wire sensors", self.registry.len());
        for sensor in &self.registry {
            info!(
                "Sensor {} [{}] {}",
                sensor.address,
                sensor.sensor_type.code(),
                sensor.label()
            );
        }
        Ok(self.registry.len())
    }

    fn new_sensor(&self, device: DeviceAddress) -> Sensor {
        let address = device.to_sensor_address();
        let (sensor_type, known) = classify(address.as_str());
        if !known {
            warn!(
                "Unknown device family {:#04x} for {}",
                device.family(),
                address
            );
        }
        let config = self
            .config
            .lookup_sensor_config(address.as_str())
            .cloned()
            .unwrap_or_default();
        Sensor::new(device, sensor_type).with_config(config)
    }

    /// Read every sensor of `sensor_type`. Returns how many readings were stored.
    pub fn sample(&mut self, sensor_type: SensorType) -> usize {
        let targets: Vec<(SensorAddress, DeviceAddress)> = self
            .registry
            .of_type(sensor_type)
            .map(|s| (s.address.clone(), s.device_address))
            .collect();

        let mut updated = 0;
        for (address, device) in targets {
            match self.bus.read_raw_value(&device, sensor_type) {
                Ok(value) => {
                    debug!("{} = {}", address, value);
                    if self.registry.update_value(address.as_str(), value) {
                        updated += 1;
                    }
                }
                Err(e) => warn!("No reading from {}: {}", address, e),
            }
        }
        updated
    }

    pub fn refresh_display(&mut self) -> anyhow::Result<()> {
        let rows = dashboard::rows(&self.registry);
        self.panel.present(&rows).context("Failed to refresh panel")
    }

    /// Publish every sampled sensor. Returns how many messages were accepted.
    pub fn publish(&mut self) -> usize {
        let messages = publish::messages(self.registry.sensors(), self.measurement_topics);
        if messages.is_empty() {
            debug!("Nothing to publish");
        }
        messages
            .iter()
            .filter(|(topic, payload)| {
                let sent = self.publisher.publish(topic, payload);
                if !sent {
                    warn!("Publishing to {} failed", topic);
                }
                sent
            })
            .count()
    }

    /// Sensor table for the config form. Discovered sensors of a known type
    /// without a slot are listed in free slots; nothing is stored until the
    /// form comes back through [`Station::apply_form`].
    pub fn form_slots(&self) -> Vec<SensorSlot> {
        let offered: Vec<&SensorAddress> = self
            .registry
            .iter()
            .filter(|s| s.sensor_type != SensorType::Unknown)
            .map(|s| &s.address)
            .collect();
        self.config.form_slots(offered)
    }

    /// Config-save handler: apply a posted form, persist it and re-attach the
    /// sensor configuration. The live record only changes once the save
    /// succeeded.
    pub fn apply_form(&mut self, body: &str) -> anyhow::Result<FormSummary> {
        let mut updated = self.config.clone();
        let summary = form::apply_form(&mut updated, body).context("Rejected config form")?;
        self.store
            .save(&updated)
            .context("Failed to save configuration")?;
        self.config = updated;
        self.registry.resolve_configs(&self.config);
        info!("Applied {} config fields", summary.applied);
        Ok(summary)
    }

    /// Run whatever is due at `now_ms`, in fixed order. Task failures are logged
    /// and do not stop the others.
    pub fn tick(&mut self, now_ms: u64) {
        if self.schedule.rescan.is_due(now_ms) {
            if let Err(e) = self.rescan() {
                error!("Bus rescan failed: {}", e);
            }
        }
        if self.schedule.temperature.is_due(now_ms) {
            self.sample(SensorType::Temperature);
        }
        if self.schedule.level.is_due(now_ms) {
            self.sample(SensorType::BatteryMonitor);
        }
        if self.schedule.display.is_due(now_ms) {
            if let Err(e) = self.refresh_display() {
                error!("{:#}", e);
            }
        }
        if self.schedule.publish.is_due(now_ms) {
            self.publish();
        }
    }
}
