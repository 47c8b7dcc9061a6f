use crate::models::SensorType;
use log::debug;

/// Maps a 1-Wire family code to the sensor type this station knows how to read.
pub fn family_type(family: u8) -> Option<SensorType> {
    match family {
        0x28 => Some(SensorType::Temperature), // DS18B20
        0x10 => Some(SensorType::Temperature), // DS18S20
        0x22 => Some(SensorType::Temperature), // DS1822
        0x26 => Some(SensorType::BatteryMonitor), // DS2438
        _ => None,
    }
}

/// Classify a sensor from the first byte of its hex address.
///
/// Returns the resolved type together with whether the lookup succeeded. An
/// unrecognised or unparsable family yields `(SensorType::Unknown, false)`;
/// callers treat both cases the same way.
pub fn classify(address: &str) -> (SensorType, bool) {
    let family = address
        .get(..2)
        .and_then(|code| u8::from_str_radix(code, 16).ok());

    match family.and_then(family_type) {
        Some(sensor_type) => (sensor_type, true),
        None => {
            debug!("No sensor type for address {:?}", address);
            (SensorType::Unknown, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_families() {
        assert_eq!(classify("28EE3F8C251601"), (SensorType::Temperature, true));
        assert_eq!(classify("10A1B2C3D4E5F607"), (SensorType::Temperature, true));
        assert_eq!(classify("2200000000000000"), (SensorType::Temperature, true));
    }

    #[test]
    fn test_battery_monitor_family() {
        assert_eq!(classify("26B1C0A500000071"), (SensorType::BatteryMonitor, true));
    }

    #[test]
    fn test_unknown_family_reports_failure() {
        assert_eq!(classify("FF00000000000000"), (SensorType::Unknown, false));
        assert_eq!(classify("ZZ00"), (SensorType::Unknown, false));
        assert_eq!(classify("2"), (SensorType::Unknown, false));
        assert_eq!(classify(""), (SensorType::Unknown, false));
    }

    #[test]
    fn test_lowercase_family_code() {
        assert_eq!(classify("28ee3f8c25160102"), (SensorType::Temperature, true));
    }
}
