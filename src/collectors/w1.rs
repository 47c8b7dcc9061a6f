use crate::collectors::{BusError, OneWireBus};
use crate::models::{DeviceAddress, SensorType};
use crate::utils::sysfs::{from_milli, read_attribute, read_number};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// DS2438 `vad` counts are 10 mV steps.
const VAD_VOLTS_PER_COUNT: f32 = 0.01;

/// 1-Wire bus exposed by the Linux w1 subsystem.
///
/// Every slave appears as `<path>/<family>-<serial>` (for example
/// `/sys/bus/w1/devices/28-0316a2795eff`).
///
/// ## What is read:
///
/// - `id`: the 8 ROM bytes, falling back to parsing the directory name
/// - DS18x20: `temperature` in milli-degrees, or the `t=` field of `w1_slave`
///   after its CRC line reported `YES`
/// - DS2438: `vad`, the voltage on the A/D input
///
/// Kernel w1 API: https://www.kernel.org/doc/html/latest/w1/w1-generic.html
#[derive(Debug, Clone)]
pub struct W1SysfsBus {
    root: PathBuf,
}

impl W1SysfsBus {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn device_dir(&self, device: &DeviceAddress) -> PathBuf {
        self.root.join(w1_name(device))
    }

    fn read_temperature(&self, dir: &Path) -> Result<f32, BusError> {
        if let Some(milli) = read_number::<i32>(&dir.join("temperature")) {
            return Ok(from_milli(milli));
        }
        let slave = read_attribute(&dir.join("w1_slave"))?;
        parse_w1_slave(&slave, &dir.display().to_string())
    }

    fn read_level(&self, dir: &Path) -> Result<f32, BusError> {
        read_number::<u32>(&dir.join("vad"))
            .map(|counts| counts as f32 * VAD_VOLTS_PER_COUNT)
            .ok_or_else(|| BusError::Malformed {
                device: dir.display().to_string(),
                detail: "unreadable vad".to_string(),
            })
    }
}

impl OneWireBus for W1SysfsBus {
    fn discover(&mut self) -> Result<Vec<DeviceAddress>, BusError> {
        let start = Instant::now();
        let mut found = Vec::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| BusError::Io(e.into()))?;
            let name = entry.file_name().to_string_lossy();
            let Some(from_name) = DeviceAddress::from_w1_name(&name) else {
                continue;
            };

            let address = match fs::read(entry.path().join("id")) {
                Ok(bytes) if bytes.len() == 8 => {
                    let mut rom = [0u8; 8];
                    rom.copy_from_slice(&bytes);
                    DeviceAddress(rom)
                }
                _ => from_name,
            };

            if !address.crc_valid() {
                warn!("Skipping {}: ROM CRC mismatch", name);
                continue;
            }
            found.push(address);
        }

        debug!(
            "w1 discovery found {} devices in {} ms",
            found.len(),
            start.elapsed().as_millis()
        );
        Ok(found)
    }

    fn read_raw_value(
        &mut self,
        device: &DeviceAddress,
        sensor_type: SensorType,
    ) -> Result<f32, BusError> {
        let dir = self.device_dir(device);
        let result = match sensor_type {
            SensorType::Temperature => self.read_temperature(&dir),
            SensorType::BatteryMonitor => self.read_level(&dir),
            SensorType::Unknown => Err(BusError::Unsupported(sensor_type)),
        };
        if let Err(ref e) = result {
            debug!("Reading {} from {} failed: {}", w1_name(device), self.root.display(), e);
        }
        result
    }
}

/// Directory name the kernel uses for a slave: lowercase family, `-`, serial
/// most significant byte first.
pub fn w1_name(device: &DeviceAddress) -> String {
    let serial: String = device.0[1..7]
        .iter()
        .rev()
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("{:02x}-{}", device.family(), serial)
}

/// Extract the temperature from a `w1_slave` dump:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(content: &str, device: &str) -> Result<f32, BusError> {
    let mut lines = content.lines();
    let crc_line = lines.next().unwrap_or("");
    if !crc_line.trim_end().ends_with("YES") {
        return Err(BusError::CrcCheckFailed(device.to_string()));
    }

    lines
        .next()
        .and_then(|line| line.rsplit_once("t="))
        .and_then(|(_, milli)| milli.trim().parse::<i32>().ok())
        .map(from_milli)
        .ok_or_else(|| BusError::Malformed {
            device: device.to_string(),
            detail: "missing t= field".to_string(),
        })
}
