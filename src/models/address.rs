use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters in a rendered sensor address.
pub const SENSOR_ADDRESS_LEN: usize = 16;

/// Raw 8-byte 1-Wire ROM code: family byte, 48-bit serial (LSB first), CRC-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceAddress(pub [u8; 8]);

impl DeviceAddress {
    pub fn family(&self) -> u8 {
        self.0[0]
    }

    /// True when byte 7 holds the Maxim CRC-8 of bytes 0..7.
    pub fn crc_valid(&self) -> bool {
        crc8(&self.0[..7]) == self.0[7]
    }

    pub fn to_sensor_address(&self) -> SensorAddress {
        let hex: String = self.0.iter().map(|b| format!("{:02X}", b)).collect();
        SensorAddress(hex)
    }

    /// Rebuild the ROM code from a Linux w1 device directory name such as
    /// `28-0316a2795eff`. The kernel prints the serial most significant byte
    /// first, the ROM stores it least significant byte first.
    pub fn from_w1_name(name: &str) -> Option<Self> {
        let (family, serial) = name.split_once('-')?;
        if family.len() != 2 || serial.len() != 12 {
            return None;
        }
        let family = u8::from_str_radix(family, 16).ok()?;
        let serial = u64::from_str_radix(serial, 16).ok()?;

        let mut rom = [0u8; 8];
        rom[0] = family;
        for (i, byte) in rom[1..7].iter_mut().enumerate() {
            *byte = (serial >> (8 * i)) as u8;
        }
        rom[7] = crc8(&rom[..7]);
        Some(Self(rom))
    }
}

impl From<[u8; 8]> for DeviceAddress {
    fn from(rom: [u8; 8]) -> Self {
        Self(rom)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sensor_address())
    }
}

/// User facing sensor identifier: 16 uppercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SensorAddress(String);

impl TryFrom<String> for SensorAddress {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("{:?} is not a 16 digit hex sensor address", value))
    }
}

impl From<SensorAddress> for String {
    fn from(address: SensorAddress) -> Self {
        address.0
    }
}

impl SensorAddress {
    /// Accepts exactly 16 hex digits in any case and normalises to uppercase.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.len() != SENSOR_ADDRESS_LEN || !input.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(input.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_device_address(&self) -> DeviceAddress {
        let mut rom = [0u8; 8];
        for (i, byte) in rom.iter_mut().enumerate() {
            // parse() guarantees hex digits
            *byte = u8::from_str_radix(&self.0[i * 2..i * 2 + 2], 16).unwrap_or(0);
        }
        DeviceAddress(rom)
    }
}

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SensorAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SensorAddress {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SensorAddress {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Dallas/Maxim 1-Wire CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    // ROM code from the Maxim application note 27 worked example.
    const AN27_ROM: [u8; 8] = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00, 0xA2];

    #[test]
    fn test_crc8_matches_reference_rom() {
        assert_eq!(crc8(&AN27_ROM[..7]), 0xA2);
        assert!(DeviceAddress(AN27_ROM).crc_valid());
    }

    #[test]
    fn test_crc_invalid_when_byte_flipped() {
        let mut rom = AN27_ROM;
        rom[3] ^= 0x10;
        assert!(!DeviceAddress(rom).crc_valid());
    }

    #[test]
    fn test_sensor_address_pads_low_bytes() {
        let addr = DeviceAddress([0x28, 0x0A, 0x00, 0xFF, 0x01, 0x10, 0x0F, 0x3C]);
        assert_eq!(addr.to_sensor_address().as_str(), "280A00FF01100F3C");
        assert_eq!(addr.to_sensor_address().as_str().len(), SENSOR_ADDRESS_LEN);
    }

    #[test]
    fn test_sensor_address_parse() {
        let parsed = SensorAddress::parse("28ee3f8c25160102").unwrap();
        assert_eq!(parsed.as_str(), "28EE3F8C25160102");
        assert_eq!(
            parsed.to_device_address().0,
            [0x28, 0xEE, 0x3F, 0x8C, 0x25, 0x16, 0x01, 0x02]
        );

        assert!(SensorAddress::parse("28EE3F8C251601").is_none());
        assert!(SensorAddress::parse("28EE3F8C2516010G").is_none());
        assert!(SensorAddress::parse("").is_none());
    }

    #[test]
    fn test_sensor_address_serde_validates() {
        let address: SensorAddress = serde_json::from_str("\"26b1c0a500000071\"").unwrap();
        assert_eq!(address, "26B1C0A500000071");
        assert_eq!(serde_json::to_string(&address).unwrap(), "\"26B1C0A500000071\"");

        assert!(serde_json::from_str::<SensorAddress>("\"26B1\"").is_err());
        assert!(serde_json::from_str::<SensorAddress>("\"\"").is_err());
    }

    #[test]
    fn test_from_w1_name() {
        let addr = DeviceAddress::from_w1_name("28-0316a2795eff").unwrap();
        assert_eq!(addr.family(), 0x28);
        assert_eq!(&addr.0[1..7], &[0xFF, 0x5E, 0x79, 0xA2, 0x16, 0x03]);
        assert!(addr.crc_valid());

        assert!(DeviceAddress::from_w1_name("w1_bus_master1").is_none());
        assert!(DeviceAddress::from_w1_name("28-0316").is_none());
    }
}
