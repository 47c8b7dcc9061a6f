//! URL-encoded configuration form as posted by the status page.
//!
//! Top level keys: `wifiSsid`, `wifiPassword`, `mqttServer`, `mqttPort`,
//! `mqttClientName`, `mqttUser`, `mqttPassword`.
//!
//! Per sensor slot `N` in `[0, SENSOR_CONFIG_COUNT)`: `sensorAddress<N>`,
//! `sensorName<N>`, `sensorValueFormat<N>`, `sensorValueFormatMin<N>`,
//! `sensorValueFormatMax<N>`, `sensorValuePrecision<N>`, `sensorValueMin<N>`,
//! `sensorValueMax<N>`, `sensorValueBonds<N>`.

use crate::models::sensor::{
    bound_from_legacy, BONDS_CAPACITY, FORMAT_CAPACITY, MAX_PRECISION, NAME_CAPACITY,
};
use crate::models::SensorAddress;
use crate::store::{ConfigRecord, SENSOR_CONFIG_COUNT};
use crate::transform::{validate_template, TemplateError};
use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("{key}: {value:?} is not a number")]
    InvalidNumber { key: String, value: String },

    #[error("{key}: {value:?} is not a 16 digit hex sensor address")]
    InvalidAddress { key: String, value: String },

    #[error("{key}: {source}")]
    InvalidFormat {
        key: String,
        #[source]
        source: TemplateError,
    },
}

/// Decode `%XX` escapes and `+` as space. Malformed escapes are kept verbatim.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Split a form body into decoded key/value pairs, in order of appearance. A
/// repeated key keeps its last value.
pub fn parse_form(body: &str) -> IndexMap<String, String> {
    body.trim()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (url_decode(key), url_decode(value)),
            None => (url_decode(pair), String::new()),
        })
        .collect()
}

/// Outcome of applying a form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormSummary {
    pub applied: usize,
    pub ignored: Vec<String>,
}

/// Apply a form body to `record`.
///
/// Only keys present in the body change the record. Every value is validated
/// first; on error the record is left as it was.
pub fn apply_form(record: &mut ConfigRecord, body: &str) -> Result<FormSummary, FormError> {
    let fields = parse_form(body);
    let mut updated = record.clone();
    let mut summary = FormSummary::default();

    for (key, value) in &fields {
        if apply_top_level(&mut updated, key, value)? {
            summary.applied += 1;
            continue;
        }
        match slot_key(key) {
            Some((field, index)) if index < SENSOR_CONFIG_COUNT => {
                if apply_slot_field(&mut updated, field, index, key, value)? {
                    summary.applied += 1;
                } else {
                    summary.ignored.push(key.clone());
                }
            }
            _ => summary.ignored.push(key.clone()),
        }
    }

    if !summary.ignored.is_empty() {
        debug!("Ignored form keys: {:?}", summary.ignored);
    }
    *record = updated;
    Ok(summary)
}

fn apply_top_level(record: &mut ConfigRecord, key: &str, value: &str) -> Result<bool, FormError> {
    match key {
        "wifiSsid" => record.wifi.ssid = value.to_string(),
        "wifiPassword" => record.wifi.password = value.to_string(),
        "mqttServer" => record.mqtt.server = value.trim().to_string(),
        "mqttPort" => {
            record.mqtt.port = value
                .trim()
                .parse()
                .map_err(|_| invalid_number(key, value))?
        }
        "mqttClientName" => record.mqtt.client_name = value.to_string(),
        "mqttUser" => record.mqtt.user = value.to_string(),
        "mqttPassword" => record.mqtt.password = value.to_string(),
        _ => return Ok(false),
    }
    Ok(true)
}

fn slot_key(key: &str) -> Option<(&str, usize)> {
    static SLOT_KEY: OnceLock<Regex> = OnceLock::new();
    let re = SLOT_KEY.get_or_init(|| Regex::new(r"^(sensor[A-Za-z]+)(\d+)$").expect("valid key pattern"));
    let caps = re.captures(key)?;
    let field = caps.get(1)?.as_str();
    let index = caps.get(2)?.as_str().parse().ok()?;
    Some((field, index))
}

fn apply_slot_field(
    record: &mut ConfigRecord,
    field: &str,
    index: usize,
    key: &str,
    value: &str,
) -> Result<bool, FormError> {
    let Some(slot) = record.sensors.get_mut(index) else {
        return Ok(false);
    };
    match field {
        "sensorAddress" => {
            let value = value.trim();
            slot.address = if value.is_empty() {
                String::new()
            } else {
                SensorAddress::parse(value)
                    .ok_or_else(|| FormError::InvalidAddress {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?
                    .to_string()
            };
        }
        "sensorName" => slot.config.name = truncate(value, NAME_CAPACITY),
        "sensorValueFormat" => {
            let format = truncate(value, FORMAT_CAPACITY);
            validate_template(&format).map_err(|source| FormError::InvalidFormat {
                key: key.to_string(),
                source,
            })?;
            slot.config.format = format;
        }
        "sensorValueFormatMin" => slot.config.format_min = parse_bound(key, value)?,
        "sensorValueFormatMax" => slot.config.format_max = parse_bound(key, value)?,
        "sensorValueMin" => slot.config.min = parse_bound(key, value)?,
        "sensorValueMax" => slot.config.max = parse_bound(key, value)?,
        "sensorValuePrecision" => {
            let value = value.trim();
            slot.config.precision = if value.is_empty() {
                0
            } else {
                let precision: i64 = value.parse().map_err(|_| invalid_number(key, value))?;
                precision.clamp(0, MAX_PRECISION as i64) as u8
            };
        }
        "sensorValueBonds" => slot.config.bonds = truncate(value.trim(), BONDS_CAPACITY),
        _ => {
            warn!("Unknown sensor form field {}", key);
            return Ok(false);
        }
    }
    Ok(true)
}

/// Empty input and negative numbers leave the bound unset.
fn parse_bound(key: &str, value: &str) -> Result<Option<f32>, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    let number: f32 = value
        .replace(',', ".")
        .parse()
        .map_err(|_| invalid_number(key, value))?;
    Ok(bound_from_legacy(number))
}

fn invalid_number(key: &str, value: &str) -> FormError {
    FormError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn truncate(value: &str, capacity: usize) -> String {
    value.chars().take(capacity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("%25s+l"), "%s l");
        assert_eq!(url_decode("a%3Db%26c"), "a=b&c");
        assert_eq!(url_decode("K%C3%BChlschrank"), "Kühlschrank");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz%4"), "%zz%4");
    }

    #[test]
    fn test_parse_form_order_and_empty_values() {
        let fields = parse_form("b=2&a=&c&b=3");
        let keys: Vec<_> = fields.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        assert_eq!(fields["b"], "3");
        assert_eq!(fields["a"], "");
        assert_eq!(fields["c"], "");
    }

    #[test]
    fn test_apply_sensor_slot() {
        let mut record = ConfigRecord::default();
        let body = "sensorAddress1=26b1c0a500000071&sensorName1=Wassertank&sensorValueFormat1=%25s+l\
                    &sensorValueMin1=0&sensorValueMax1=3&sensorValueFormatMin1=0\
                    &sensorValueFormatMax1=120&sensorValuePrecision1=0";

        let summary = apply_form(&mut record, body).unwrap();
        assert_eq!(summary.applied, 8);

        let slot = &record.sensors[1];
        assert_eq!(slot.address, "26B1C0A500000071");
        assert_eq!(slot.config.name, "Wassertank");
        assert_eq!(slot.config.format, "%s l");
        assert_eq!(slot.config.min, Some(0.0));
        assert_eq!(slot.config.max, Some(3.0));
        assert_eq!(slot.config.format_max, Some(120.0));
    }

    #[test]
    fn test_apply_top_level() {
        let mut record = ConfigRecord::default();
        let body = "wifiSsid=My+Net&wifiPassword=p%40ss&mqttServer=192.168.66.21&mqttPort=8883&mqttUser=station";
        apply_form(&mut record, body).unwrap();
        assert_eq!(record.wifi.ssid, "My Net");
        assert_eq!(record.wifi.password, "p@ss");
        assert_eq!(record.mqtt.server, "192.168.66.21");
        assert_eq!(record.mqtt.port, 8883);
        assert_eq!(record.mqtt.user, "station");
    }

    #[test]
    fn test_negative_and_empty_bounds_unset() {
        let mut record = ConfigRecord::default();
        record.sensors[0].config.min = Some(1.0);
        apply_form(&mut record, "sensorValueMin0=-1&sensorValueMax0=&sensorValueFormatMin0=2,5").unwrap();
        assert_eq!(record.sensors[0].config.min, None);
        assert_eq!(record.sensors[0].config.max, None);
        assert_eq!(record.sensors[0].config.format_min, Some(2.5));
    }

    #[test]
    fn test_invalid_value_leaves_record_untouched() {
        let mut record = ConfigRecord::default();
        let result = apply_form(&mut record, "sensorName0=Tank&sensorValueMax0=three");
        assert_eq!(
            result,
            Err(FormError::InvalidNumber {
                key: "sensorValueMax0".to_string(),
                value: "three".to_string()
            })
        );
        assert_eq!(record, ConfigRecord::default());
    }

    #[test]
    fn test_invalid_address_and_format() {
        let mut record = ConfigRecord::default();
        assert!(matches!(
            apply_form(&mut record, "sensorAddress0=28EE"),
            Err(FormError::InvalidAddress { .. })
        ));
        assert!(matches!(
            apply_form(&mut record, "sensorValueFormat0=%25d+C"),
            Err(FormError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_out_of_range_slot_and_unknown_keys_ignored() {
        let mut record = ConfigRecord::default();
        let summary = apply_form(&mut record, "sensorName10=x&submit=Save&sensorColour0=red").unwrap();
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.ignored, vec!["sensorName10", "submit", "sensorColour0"]);
        assert_eq!(record, ConfigRecord::default());
    }

    #[test]
    fn test_capacities_and_precision_clamp() {
        let mut record = ConfigRecord::default();
        apply_form(
            &mut record,
            "sensorName2=A+very+long+sensor+name+indeed&sensorValuePrecision2=9&sensorValuePrecision3=-2",
        )
        .unwrap();
        assert_eq!(record.sensors[2].config.name, "A very long sensor n");
        assert_eq!(record.sensors[2].config.precision, MAX_PRECISION);
        assert_eq!(record.sensors[3].config.precision, 0);
    }

    #[test]
    fn test_clearing_address_frees_slot() {
        let mut record = ConfigRecord::default();
        record.sensors[0].address = "28EE3F8C25160102".to_string();
        apply_form(&mut record, "sensorAddress0=").unwrap();
        assert!(record.sensors[0].is_free());
    }
}
